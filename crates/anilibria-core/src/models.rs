//! Catalog records.
//!
//! These mirror the JSON objects returned by the REST API and embedded in
//! gateway payloads. The service omits fields freely depending on the
//! `filter`/`remove` query parameters, so nearly everything is optional and
//! every struct decodes from partial JSON (`#[serde(default)]`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Title names in the languages the catalog provides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleNames {
    /// Russian name.
    pub ru: Option<String>,
    /// English name.
    pub en: Option<String>,
    /// Alternative name.
    pub alternative: Option<String>,
}

/// Release status of a title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleStatus {
    /// Human-readable status.
    pub string: Option<String>,
    /// Numeric status code.
    pub code: Option<i64>,
}

/// A single poster image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Poster {
    /// Relative URL of the poster.
    pub url: Option<String>,
    /// Base64-encoded image, present only when requested via `include`.
    pub raw_base64_file: Option<String>,
}

impl Poster {
    /// Absolute poster URL on the main site.
    pub fn full_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|url| format!("https://anilibria.tv{url}"))
    }
}

/// Posters in every available size.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Posters {
    /// Small poster.
    pub small: Option<Poster>,
    /// Medium poster.
    pub medium: Option<Poster>,
    /// Original-size poster.
    pub original: Option<Poster>,
}

/// Title format (TV, movie, OVA, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleType {
    /// Full description, e.g. "ТВ (12 эп.), 24 мин.".
    pub full_string: Option<String>,
    /// Numeric type code.
    pub code: Option<i64>,
    /// Short description.
    pub string: Option<String>,
    /// Planned episode count.
    pub episodes: Option<i64>,
    /// Episode length.
    pub length: Option<Value>,
}

/// Release team members.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleTeam {
    /// Voice actors.
    pub voice: Vec<String>,
    /// Translators.
    pub translator: Vec<String>,
    /// Subtitle editors.
    pub editing: Vec<String>,
    /// Typesetters.
    pub decor: Vec<String>,
    /// Timers.
    pub timing: Vec<String>,
}

/// Airing season.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Season {
    /// Season name.
    pub string: Option<String>,
    /// Season code (1 = winter .. 4 = autumn).
    pub code: Option<i64>,
    /// Year.
    pub year: Option<i64>,
    /// Day of week the title airs on (0 = Monday).
    pub week_day: Option<i64>,
}

/// Regional blocking flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blocked {
    /// Blocked in the Russian Federation.
    pub blocked: bool,
    /// Blocked after a rights-holder complaint.
    pub bakanim: bool,
}

/// Range of released episodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episodes {
    /// First episode number.
    pub first: Option<Value>,
    /// Last episode number.
    pub last: Option<Value>,
    /// Range as text, e.g. "1-12".
    pub string: Option<String>,
}

/// Stream resolution tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// 1080p.
    Fhd,
    /// 720p.
    Hd,
    /// 480p.
    Sd,
}

impl Resolution {
    /// Every tier, highest first.
    pub const ALL: [Self; 3] = [Self::Fhd, Self::Hd, Self::Sd];

    /// JSON key of the tier inside an `hls` object.
    pub fn key(self) -> &'static str {
        match self {
            Self::Fhd => "fhd",
            Self::Hd => "hd",
            Self::Sd => "sd",
        }
    }
}

/// Relative HLS playlist links per resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hls {
    /// 1080p link.
    pub fhd: Option<String>,
    /// 720p link.
    pub hd: Option<String>,
    /// 480p link.
    pub sd: Option<String>,
}

impl Hls {
    /// Link for one tier.
    pub fn link(&self, resolution: Resolution) -> Option<&str> {
        match resolution {
            Resolution::Fhd => self.fhd.as_deref(),
            Resolution::Hd => self.hd.as_deref(),
            Resolution::Sd => self.sd.as_deref(),
        }
    }

    /// Whether the tier has a usable (non-empty) link.
    pub fn has(&self, resolution: Resolution) -> bool {
        self.link(resolution).is_some_and(|link| !link.is_empty())
    }

    /// All three tiers are available.
    pub fn is_complete(&self) -> bool {
        Resolution::ALL.iter().all(|r| self.has(*r))
    }
}

/// Opening/ending skip timecodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerieSkips {
    /// Opening timecodes.
    pub opening: Vec<Value>,
    /// Ending timecodes.
    pub ending: Vec<Value>,
}

/// One episode of a title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    /// Episode number. Not always an integer (`10.5` recaps exist).
    pub episode: Option<Number>,
    /// Episode name.
    pub name: Option<String>,
    /// Episode UUID.
    pub uuid: Option<String>,
    /// Creation/update time, UNIX seconds.
    pub created_timestamp: Option<i64>,
    /// Relative preview image URL.
    pub preview: Option<String>,
    /// Skip timecodes.
    pub skips: Option<SerieSkips>,
    /// Stream links.
    pub hls: Option<Hls>,
}

impl Episode {
    /// The episode number as the service writes it in playlist keys.
    pub fn number_key(&self) -> Option<String> {
        self.episode.as_ref().map(ToString::to_string)
    }
}

/// Episode list, which the API sends either keyed by number or as an array
/// depending on the `playlist_type` parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Playlist {
    /// `{"1": {...}, "2": {...}}`
    Map(BTreeMap<String, Episode>),
    /// `[{...}, {...}]`
    List(Vec<Episode>),
}

impl Playlist {
    /// Look an episode up by its number key.
    pub fn get(&self, number: &str) -> Option<&Episode> {
        match self {
            Self::Map(map) => map.get(number),
            Self::List(list) => list
                .iter()
                .find(|ep| ep.number_key().as_deref() == Some(number)),
        }
    }

    /// Number of episodes.
    pub fn len(&self) -> usize {
        match self {
            Self::Map(map) => map.len(),
            Self::List(list) => list.len(),
        }
    }

    /// Whether there are no episodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Player block of a title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    /// Alternative player URL.
    pub alternative_player: Option<String>,
    /// Preferred stream host.
    pub host: Option<String>,
    /// Released episode range.
    pub episodes: Option<Episodes>,
    /// Episodes.
    pub list: Option<Playlist>,
}

/// Encoding details of a torrent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quality {
    /// Full description, e.g. "WEBRip 1080p HEVC".
    pub string: Option<String>,
    /// Source type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Resolution, e.g. "1080p".
    pub resolution: Option<String>,
    /// Encoder, e.g. "h264".
    pub encoder: Option<String>,
    /// Low-quality audio flag.
    pub lq_audio: Option<bool>,
}

/// One torrent of a title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Torrent {
    /// Torrent id.
    pub torrent_id: Option<i64>,
    /// Episodes covered.
    pub episodes: Option<Episodes>,
    /// Encoding details.
    pub quality: Option<Quality>,
    /// Leecher count.
    pub leechers: Option<i64>,
    /// Seeder count.
    pub seeders: Option<i64>,
    /// Download count.
    pub downloads: Option<i64>,
    /// Size in bytes.
    pub total_size: Option<i64>,
    /// Human-readable size.
    pub size_string: Option<String>,
    /// Relative `.torrent` URL.
    pub url: Option<String>,
    /// Magnet link.
    pub magnet: Option<String>,
    /// Upload time, UNIX seconds.
    pub uploaded_timestamp: Option<i64>,
    /// Info hash.
    pub hash: Option<String>,
}

/// Torrent block of a title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Torrents {
    /// Episode range covered by all torrents.
    pub episodes: Option<Episodes>,
    /// Torrents.
    pub list: Vec<Torrent>,
}

/// A catalog title.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Title {
    /// Title id.
    pub id: i64,
    /// URL slug.
    pub code: Option<String>,
    /// Names.
    pub names: Option<TitleNames>,
    /// Announcement text.
    pub announce: Option<String>,
    /// Release status.
    pub status: Option<TitleStatus>,
    /// Posters.
    pub posters: Option<Posters>,
    /// Last update, UNIX seconds.
    pub updated: Option<i64>,
    /// Last content change, UNIX seconds.
    pub last_change: Option<i64>,
    /// Format.
    #[serde(rename = "type")]
    pub kind: Option<TitleType>,
    /// Genres.
    pub genres: Vec<String>,
    /// Release team.
    pub team: Option<TitleTeam>,
    /// Airing season.
    pub season: Option<Season>,
    /// Description.
    pub description: Option<String>,
    /// Number of users who favorited the title.
    pub in_favorites: Option<i64>,
    /// Blocking flags.
    pub blocked: Option<Blocked>,
    /// Player and episodes.
    pub player: Option<Player>,
    /// Torrents.
    pub torrents: Option<Torrents>,
}
