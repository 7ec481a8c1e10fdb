//! Gateway event vocabulary.
//!
//! Every inbound message becomes one [`GatewayEvent`]. Known tags decode into
//! typed records listed in the static [`EventKind`] table; tags the table does
//! not know are kept as [`GatewayEvent::Unknown`] with the raw payload.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use anilibria_core::{Episode, Player, Title, Torrents};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Handler names of events that have no tag on the wire.
pub mod names {
    /// First successful connection of a client.
    pub const STARTUP: &str = "on_startup";
    /// Every inbound JSON object, before classification.
    pub const RAW_PACKET: &str = "on_raw_packet";
    /// Server handshake.
    pub const CONNECT: &str = "on_connect";
    /// Subscription acknowledgment.
    pub const SUBSCRIPTION: &str = "on_subscription";
    /// An episode became fully available.
    pub const TITLE_EPISODE: &str = "on_title_episode";
}

// ── Event kind table ───────────────────────────────────────────────────────

/// Tagged message kinds the gateway decodes into typed records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `title_update`
    TitleUpdate,
    /// `playlist_update`
    PlaylistUpdate,
    /// `encode_start`
    EncodeStart,
    /// `encode_progress`
    EncodeProgress,
    /// `encode_end`
    EncodeEnd,
    /// `encode_finish`
    EncodeFinish,
    /// `torrent_update`
    TorrentUpdate,
}

static KINDS: LazyLock<HashMap<&'static str, EventKind>> = LazyLock::new(|| {
    EventKind::ALL.iter().map(|kind| (kind.tag(), *kind)).collect()
});

impl EventKind {
    /// Every known kind.
    pub const ALL: [Self; 7] = [
        Self::TitleUpdate,
        Self::PlaylistUpdate,
        Self::EncodeStart,
        Self::EncodeProgress,
        Self::EncodeEnd,
        Self::EncodeFinish,
        Self::TorrentUpdate,
    ];

    /// Look a wire tag up in the kind table.
    pub fn from_tag(tag: &str) -> Option<Self> {
        KINDS.get(tag).copied()
    }

    /// Wire tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::TitleUpdate => "title_update",
            Self::PlaylistUpdate => "playlist_update",
            Self::EncodeStart => "encode_start",
            Self::EncodeProgress => "encode_progress",
            Self::EncodeEnd => "encode_end",
            Self::EncodeFinish => "encode_finish",
            Self::TorrentUpdate => "torrent_update",
        }
    }

    /// Handler name, `on_` + tag.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::TitleUpdate => "on_title_update",
            Self::PlaylistUpdate => "on_playlist_update",
            Self::EncodeStart => "on_encode_start",
            Self::EncodeProgress => "on_encode_progress",
            Self::EncodeEnd => "on_encode_end",
            Self::EncodeFinish => "on_encode_finish",
            Self::TorrentUpdate => "on_torrent_update",
        }
    }
}

// ── Records ────────────────────────────────────────────────────────────────

/// Accepts a string or a number and keeps its text.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Marker for the one-time startup event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Startup;

/// Server handshake, `{"connection": "success", "api_version": ...}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connect {
    /// API version reported by the server.
    pub api_version: Option<String>,
}

/// Subscription acknowledgment, `{"subscribe": true, "subscription_id": ...}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionAck {
    /// Whether the subscription was accepted.
    pub subscribe: bool,
    /// Server-side id of the subscription.
    pub subscription_id: Option<i64>,
}

/// A title record changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleUpdate {
    /// Content hash.
    pub hash: Option<String>,
    /// Updated title.
    pub title: Title,
    /// Previous values of the changed fields.
    pub diff: Value,
}

/// A title's episode list changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistUpdate {
    /// Title id.
    pub id: Option<i64>,
    /// Player block after the change.
    pub player: Option<Player>,
    /// The episode that changed.
    pub updated_episode: Option<Episode>,
    /// Number of the changed episode.
    #[serde(deserialize_with = "lenient_string")]
    pub episode: String,
    /// Previous values of the changed fields.
    pub diff: Value,
    /// Existing content was uploaded again.
    pub reupload: bool,
}

/// Encoding of an episode started.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeStart {
    /// Title id.
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Episode number.
    #[serde(deserialize_with = "lenient_string")]
    pub episode: String,
    /// Target resolution.
    #[serde(deserialize_with = "lenient_string")]
    pub resolution: String,
    /// Target quality.
    #[serde(deserialize_with = "lenient_string")]
    pub quality: String,
    /// Re-encode of existing content.
    #[serde(rename = "isReupload")]
    pub is_reupload: bool,
}

/// Encoding progress tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeProgress {
    /// Title id.
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Episode number.
    #[serde(deserialize_with = "lenient_string")]
    pub episode: String,
    /// Target resolution.
    #[serde(deserialize_with = "lenient_string")]
    pub resolution: String,
    /// Target quality.
    #[serde(deserialize_with = "lenient_string")]
    pub quality: String,
    /// Percent done.
    #[serde(deserialize_with = "lenient_string")]
    pub encoded_percent: String,
}

/// Encoding of one resolution ended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeEnd {
    /// Title id.
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Episode number.
    #[serde(deserialize_with = "lenient_string")]
    pub episode: String,
    /// Resolution.
    #[serde(deserialize_with = "lenient_string")]
    pub resolution: String,
    /// Quality.
    #[serde(deserialize_with = "lenient_string")]
    pub quality: String,
}

/// All encodings of an episode finished.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeFinish {
    /// Title id.
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Episode number.
    #[serde(deserialize_with = "lenient_string")]
    pub episode: String,
}

/// A title's torrents changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentUpdate {
    /// Title id.
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Torrents after the change.
    pub torrents: Option<Torrents>,
    /// The torrent that changed.
    pub updated_torrent_id: Option<i64>,
    /// Previous values of the changed fields.
    pub diff: Value,
    /// Content hash.
    pub hash: Option<String>,
}

/// An episode became fully available. Derived from a [`PlaylistUpdate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleEpisode {
    /// Full title record.
    pub title: Title,
    /// The completed episode.
    pub episode: Episode,
}

// ── Event union ────────────────────────────────────────────────────────────

/// Anything the gateway dispatches.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    /// First successful connection.
    Startup(Startup),
    /// Every inbound object before classification.
    RawPacket(Value),
    /// Server handshake.
    Connect(Connect),
    /// Subscription acknowledgment.
    Subscription(SubscriptionAck),
    /// `title_update`
    TitleUpdate(TitleUpdate),
    /// `playlist_update`
    PlaylistUpdate(PlaylistUpdate),
    /// `encode_start`
    EncodeStart(EncodeStart),
    /// `encode_progress`
    EncodeProgress(EncodeProgress),
    /// `encode_end`
    EncodeEnd(EncodeEnd),
    /// `encode_finish`
    EncodeFinish(EncodeFinish),
    /// `torrent_update`
    TorrentUpdate(TorrentUpdate),
    /// Derived new-episode notification.
    TitleEpisode(TitleEpisode),
    /// A tag this client does not know yet.
    Unknown {
        /// Wire tag.
        tag: String,
        /// Whole inbound payload.
        payload: Value,
    },
}

impl GatewayEvent {
    /// Handler name this event is dispatched under.
    pub fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            Self::Startup(_) => names::STARTUP,
            Self::RawPacket(_) => names::RAW_PACKET,
            Self::Connect(_) => names::CONNECT,
            Self::Subscription(_) => names::SUBSCRIPTION,
            Self::TitleUpdate(_) => EventKind::TitleUpdate.event_name(),
            Self::PlaylistUpdate(_) => EventKind::PlaylistUpdate.event_name(),
            Self::EncodeStart(_) => EventKind::EncodeStart.event_name(),
            Self::EncodeProgress(_) => EventKind::EncodeProgress.event_name(),
            Self::EncodeEnd(_) => EventKind::EncodeEnd.event_name(),
            Self::EncodeFinish(_) => EventKind::EncodeFinish.event_name(),
            Self::TorrentUpdate(_) => EventKind::TorrentUpdate.event_name(),
            Self::TitleEpisode(_) => names::TITLE_EPISODE,
            Self::Unknown { tag, .. } => return Cow::Owned(format!("on_{tag}")),
        })
    }
}

/// A record type that can be registered for by type instead of by name.
pub trait TypedEvent: Send + Sync + 'static {
    /// Handler name of the event.
    const NAME: &'static str;

    /// Borrow the record out of a dispatched event, if it is this type.
    fn extract(event: &GatewayEvent) -> Option<&Self>;
}

macro_rules! typed_event {
    ($ty:ident, $variant:ident, $name:expr) => {
        impl TypedEvent for $ty {
            const NAME: &'static str = $name;

            fn extract(event: &GatewayEvent) -> Option<&Self> {
                match event {
                    GatewayEvent::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

typed_event!(Startup, Startup, names::STARTUP);
typed_event!(Connect, Connect, names::CONNECT);
typed_event!(SubscriptionAck, Subscription, names::SUBSCRIPTION);
typed_event!(TitleUpdate, TitleUpdate, "on_title_update");
typed_event!(PlaylistUpdate, PlaylistUpdate, "on_playlist_update");
typed_event!(EncodeStart, EncodeStart, "on_encode_start");
typed_event!(EncodeProgress, EncodeProgress, "on_encode_progress");
typed_event!(EncodeEnd, EncodeEnd, "on_encode_end");
typed_event!(EncodeFinish, EncodeFinish, "on_encode_finish");
typed_event!(TorrentUpdate, TorrentUpdate, "on_torrent_update");
typed_event!(TitleEpisode, TitleEpisode, names::TITLE_EPISODE);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_table_round_trips_tags() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_tag(kind.tag()), Some(kind));
            assert_eq!(kind.event_name(), format!("on_{}", kind.tag()));
        }
        assert_eq!(EventKind::from_tag("video_update"), None);
    }

    #[test]
    fn typed_names_match_dispatch_names() {
        assert_eq!(
            GatewayEvent::TitleUpdate(TitleUpdate::default()).name(),
            TitleUpdate::NAME
        );
        assert_eq!(
            GatewayEvent::TitleEpisode(TitleEpisode::default()).name(),
            TitleEpisode::NAME
        );
        assert_eq!(GatewayEvent::Startup(Startup).name(), Startup::NAME);
    }

    #[test]
    fn unknown_name_is_prefixed_tag() {
        let event = GatewayEvent::Unknown {
            tag: "video_update".into(),
            payload: json!({}),
        };
        assert_eq!(event.name(), "on_video_update");
    }

    #[test]
    fn extract_only_matches_own_variant() {
        let event = GatewayEvent::Connect(Connect {
            api_version: Some("3.0.14".into()),
        });
        assert_eq!(
            Connect::extract(&event).and_then(|c| c.api_version.as_deref()),
            Some("3.0.14")
        );
        assert!(TitleUpdate::extract(&event).is_none());
    }

    #[test]
    fn encode_start_reads_camel_case_reupload() {
        let event: EncodeStart = serde_json::from_value(json!({
            "id": 9000, "episode": 3, "resolution": "1080", "quality": "fhd", "isReupload": true
        }))
        .unwrap();
        assert!(event.is_reupload);
        assert_eq!(event.id, "9000");
        assert_eq!(event.episode, "3");
    }

    #[test]
    fn playlist_update_tolerates_missing_fields() {
        let event: PlaylistUpdate = serde_json::from_value(json!({"id": 5})).unwrap();
        assert_eq!(event.id, Some(5));
        assert!(event.updated_episode.is_none());
        assert!(!event.reupload);
        assert!(event.diff.is_null());
    }
}
