//! Title enrichment collaborator.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::Title;

/// Fetches a full [`Title`] record by id.
///
/// Gateway playlist updates only carry a partial title; the episode deriver
/// uses this to build a complete `TitleEpisode` event. Implementations must
/// suspend rather than block.
#[async_trait]
pub trait TitleFetcher: Send + Sync {
    /// Fetch the title with the given id.
    async fn fetch_title(&self, id: i64) -> Result<Title, FetchError>;
}
