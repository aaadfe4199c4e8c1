use async_trait::async_trait;
use thiserror::Error;

use crate::helix::HelixErr;
use crate::storage::StorageErr;
use crate::summary::GameSummary;

pub mod batch;
pub mod catalog;
pub mod twitch;


pub use batch::collect_batch;
pub use catalog::CatalogCache;
pub use twitch::{TrendingGame, TwitchCollector};

/// A source of per-game viewership data.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Tag written into every summary this collector produces
    fn source(&self) -> &str;

    /// Runs the full pipeline for one game.
    ///
    /// A game that can't be found or has no live streams is an `Ok` empty summary; `Err` is
    /// reserved for failures that leave nothing meaningful to report.
    async fn collect_game_data(&self, game_name: &str) -> CollectorResult<GameSummary>;
}

pub type CollectorResult<T> = core::result::Result<T, CollectorErr>;

#[derive(Debug, Error)]
pub enum CollectorErr {
    #[error(transparent)]
    Helix(#[from] HelixErr),

    #[error(transparent)]
    Storage(#[from] StorageErr),
}
