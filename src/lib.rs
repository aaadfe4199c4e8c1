//! Viewer-count telemetry for tracked games, collected from twitch's helix API.
//!
//! [`collector::TwitchCollector`] runs the per-game pipeline (session, game id lookup, paginated
//! stream fetch, aggregation, persistence) and [`collector::collect_batch`] fans it out over a
//! bounded set of concurrent tasks.

pub mod collector;
pub mod constants;
pub mod helix;
pub mod storage;
pub mod summary;
pub mod util;

pub mod prelude {
    pub use crate::collector::{
        CatalogCache, Collector, CollectorErr, CollectorResult, TrendingGame, TwitchCollector,
        collect_batch,
    };
    pub use crate::helix::{HelixClient, HelixConfig, HelixErr, SessionCache};
    pub use crate::storage::{JsonFileStore, RawSink};
    pub use crate::summary::{GameSummary, RawSnapshot, summarize};
    pub use crate::util::env::{Env, env};
}
