//! New-episode detection.
//!
//! `playlist_update` fires on every partial change of a title's episode list:
//! new uploads, quality tiers finishing one by one, metadata edits and
//! re-uploads. [`evaluate`] picks out the updates where an episode just
//! became available in every resolution; [`EpisodeDeriver`] turns those into
//! [`TitleEpisode`] events by fetching the full title.
//!
//! Rules, first match wins:
//!
//! 1. re-uploads never qualify
//! 2. no `updated_episode`: skip
//! 3. complete `hls` and no `diff.playlist`: first appearance, qualifies
//! 4. `diff.playlist[<episode>].hls` was incomplete and `hls` is now complete:
//!    qualifies; it was already complete: metadata edit, skip
//! 5. anything else: skip

use std::sync::Arc;

use anilibria_core::{Hls, TitleFetcher};
use serde_json::Value;
use tracing::debug;

use crate::errors::DeriveError;
use crate::events::{PlaylistUpdate, TitleEpisode};

/// Outcome of [`evaluate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Episode appeared complete in one update.
    FirstAppearance,
    /// Episode went from incomplete to complete.
    Completed,
    /// Existing content was uploaded again.
    Reupload,
    /// The update names no episode.
    NoEpisode,
    /// The episode was already complete before this update.
    AlreadyComplete,
    /// Nothing indicates a newly available episode.
    Inconclusive,
}

impl Verdict {
    /// Whether a `TitleEpisode` should be raised.
    pub fn qualifies(self) -> bool {
        matches!(self, Self::FirstAppearance | Self::Completed)
    }
}

/// Decide whether `update` makes an episode newly available.
pub fn evaluate(update: &PlaylistUpdate) -> Verdict {
    if update.reupload {
        return Verdict::Reupload;
    }
    let Some(episode) = &update.updated_episode else {
        return Verdict::NoEpisode;
    };
    let complete = episode.hls.as_ref().is_some_and(Hls::is_complete);

    let Some(previous) = update.diff.get("playlist").filter(|p| !p.is_null()) else {
        return if complete {
            Verdict::FirstAppearance
        } else {
            Verdict::Inconclusive
        };
    };

    let Some(key) = episode
        .number_key()
        .or_else(|| (!update.episode.is_empty()).then(|| update.episode.clone()))
    else {
        return Verdict::Inconclusive;
    };

    let Some(previous_hls) = previous
        .get(key.as_str())
        .and_then(|ep| ep.get("hls"))
        .filter(|hls| !hls.is_null())
    else {
        return Verdict::Inconclusive;
    };

    if previous_complete(previous_hls) {
        Verdict::AlreadyComplete
    } else if complete {
        Verdict::Completed
    } else {
        Verdict::Inconclusive
    }
}

/// Tiers that are not non-empty strings count as missing.
fn previous_complete(hls: &Value) -> bool {
    let tier = |key: &str| value_str(hls, key).is_some_and(|link| !link.is_empty());
    tier("fhd") && tier("hd") && tier("sd")
}

fn value_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Builds [`TitleEpisode`] events from qualifying playlist updates.
#[derive(Clone)]
pub struct EpisodeDeriver {
    fetcher: Arc<dyn TitleFetcher>,
}

impl EpisodeDeriver {
    /// Deriver enriching through `fetcher`.
    pub fn new(fetcher: Arc<dyn TitleFetcher>) -> Self {
        Self { fetcher }
    }

    /// `Ok(None)` when the update does not qualify; the title is only fetched when it does.
    pub async fn derive(&self, update: &PlaylistUpdate) -> Result<Option<TitleEpisode>, DeriveError> {
        let verdict = evaluate(update);
        debug!(id = ?update.id, episode = %update.episode, ?verdict, "evaluated playlist update");
        if !verdict.qualifies() {
            return Ok(None);
        }
        let Some(episode) = update.updated_episode.clone() else {
            return Ok(None);
        };
        let id = update.id.ok_or(DeriveError::MissingId)?;
        let title = self
            .fetcher
            .fetch_title(id)
            .await
            .map_err(|source| DeriveError::Fetch { id, source })?;
        Ok(Some(TitleEpisode { title, episode }))
    }
}

impl std::fmt::Debug for EpisodeDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeDeriver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anilibria_core::{Episode, FetchError, Title};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::json;

    fn update(value: Value) -> PlaylistUpdate {
        serde_json::from_value(value).unwrap()
    }

    fn complete_hls() -> Value {
        json!({"fhd": "/fhd.m3u8", "hd": "/hd.m3u8", "sd": "/sd.m3u8"})
    }

    #[test]
    fn reupload_never_qualifies() {
        let u = update(json!({
            "id": 5, "reupload": true, "diff": {},
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::Reupload);
    }

    #[test]
    fn missing_episode_skips() {
        assert_eq!(evaluate(&update(json!({"id": 5, "diff": {}}))), Verdict::NoEpisode);
    }

    #[test]
    fn complete_without_previous_playlist_is_new() {
        let u = update(json!({
            "id": 5, "reupload": false, "diff": {},
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::FirstAppearance);
    }

    #[test]
    fn incomplete_without_previous_playlist_skips() {
        let u = update(json!({
            "id": 5, "diff": {},
            "updated_episode": {"episode": 3, "hls": {"fhd": "/a", "hd": null, "sd": null}}
        }));
        assert_eq!(evaluate(&u), Verdict::Inconclusive);
    }

    #[test]
    fn incomplete_to_complete_is_new() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"3": {"hls": {"fhd": null, "hd": "/hd.m3u8", "sd": "/sd.m3u8"}}}},
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::Completed);
    }

    #[test]
    fn partial_previous_hls_counts_as_incomplete() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"3": {"hls": {"sd": null}}}},
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::Completed);
    }

    #[test]
    fn previously_complete_is_metadata_edit() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"3": {"hls": complete_hls(), "name": "old"}}},
            "updated_episode": {"episode": 3, "name": "new", "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::AlreadyComplete);
    }

    #[test]
    fn episode_missing_from_diff_skips() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"2": {"hls": {"fhd": null}}}},
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::Inconclusive);
    }

    #[test]
    fn fractional_episode_numbers_are_looked_up_by_text() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"10.5": {"hls": {"fhd": null}}}},
            "updated_episode": {"episode": 10.5, "hls": complete_hls()}
        }));
        assert_eq!(evaluate(&u), Verdict::Completed);
    }

    #[test]
    fn still_incomplete_after_update_skips() {
        let u = update(json!({
            "id": 5,
            "diff": {"playlist": {"3": {"hls": {"fhd": null, "hd": null, "sd": "/sd"}}}},
            "updated_episode": {"episode": 3, "hls": {"fhd": null, "hd": "/hd", "sd": "/sd"}}
        }));
        assert_eq!(evaluate(&u), Verdict::Inconclusive);
    }

    // ── Deriver ──

    struct FakeFetcher {
        calls: Mutex<Vec<i64>>,
        fail: bool,
    }

    impl FakeFetcher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl TitleFetcher for FakeFetcher {
        async fn fetch_title(&self, id: i64) -> Result<Title, FetchError> {
            self.calls.lock().push(id);
            if self.fail {
                return Err(FetchError::Transport {
                    message: "connection refused".into(),
                });
            }
            Ok(Title {
                id,
                code: Some("test".into()),
                ..Title::default()
            })
        }
    }

    fn new_episode_update() -> PlaylistUpdate {
        update(json!({
            "id": 5, "diff": {}, "reupload": false,
            "updated_episode": {"episode": 3, "hls": complete_hls()}
        }))
    }

    #[tokio::test]
    async fn derive_fetches_title() {
        let fetcher = FakeFetcher::new(false);
        let deriver = EpisodeDeriver::new(fetcher.clone());
        let derived = deriver.derive(&new_episode_update()).await.unwrap().unwrap();
        assert_eq!(derived.title.id, 5);
        assert_eq!(derived.episode.number_key().as_deref(), Some("3"));
        assert_eq!(*fetcher.calls.lock(), vec![5]);
    }

    #[tokio::test]
    async fn non_qualifying_update_does_not_fetch() {
        let fetcher = FakeFetcher::new(false);
        let deriver = EpisodeDeriver::new(fetcher.clone());
        let mut u = new_episode_update();
        u.reupload = true;
        assert!(deriver.derive(&u).await.unwrap().is_none());
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let deriver = EpisodeDeriver::new(FakeFetcher::new(true));
        let err = deriver.derive(&new_episode_update()).await.unwrap_err();
        assert_matches!(err, DeriveError::Fetch { id: 5, .. });
    }

    #[tokio::test]
    async fn missing_id_is_reported() {
        let deriver = EpisodeDeriver::new(FakeFetcher::new(false));
        let mut u = new_episode_update();
        u.id = None;
        assert_matches!(deriver.derive(&u).await, Err(DeriveError::MissingId));
    }

    fn hls_strategy() -> impl Strategy<Value = Hls> {
        let tier = prop_oneof![Just(None), Just(Some(String::new())), Just(Some("/x.m3u8".to_string()))];
        (tier.clone(), tier.clone(), tier).prop_map(|(fhd, hd, sd)| Hls { fhd, hd, sd })
    }

    fn with(hls: Hls, diff: Value, reupload: bool) -> PlaylistUpdate {
        PlaylistUpdate {
            id: Some(1),
            updated_episode: Some(Episode {
                episode: Some(3.into()),
                hls: Some(hls),
                ..Episode::default()
            }),
            diff,
            reupload,
            ..PlaylistUpdate::default()
        }
    }

    proptest! {
        #[test]
        fn reupload_is_never_new(hls in hls_strategy(), prev in hls_strategy(), with_diff in any::<bool>()) {
            let diff = if with_diff {
                json!({"playlist": {"3": {"hls": serde_json::to_value(&prev).unwrap()}}})
            } else {
                json!({})
            };
            prop_assert!(!evaluate(&with(hls, diff, true)).qualifies());
        }

        #[test]
        fn complete_without_diff_is_always_new(extra in "[a-z]{0,8}") {
            let hls = Hls { fhd: Some(format!("/f{extra}")), hd: Some("/h".into()), sd: Some("/s".into()) };
            let diff = json!({"title": extra});
            prop_assert!(evaluate(&with(hls, diff, false)).qualifies());
        }

        #[test]
        fn previously_complete_is_never_new(hls in hls_strategy()) {
            let diff = json!({"playlist": {"3": {"hls": complete_hls()}}});
            prop_assert!(!evaluate(&with(hls, diff, false)).qualifies());
        }
    }
}
