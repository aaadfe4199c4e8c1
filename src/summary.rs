//! Per-game aggregation of live stream records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{RAW_SNAPSHOT_STREAMS, TOP_STREAMER_NOT_FOUND, TOP_VIEWERS_LEN};
use crate::helix::types::HelixStream;

/// Summary statistics for one game at one collection instant.
///
/// Every summary has the same shape whether the game had live streams, had none, or failed to
/// collect; `error` is the only field that distinguishes a failure from an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_name: String,
    pub timestamp: DateTime<Utc>,
    pub total_viewers: u64,
    pub stream_count: usize,
    pub average_viewers_per_stream: f64,
    pub top_streamer: String,
    pub top_stream_viewers: u64,
    /// Viewer counts of the first records in upstream order (not the largest ones)
    pub top_5_viewers: Vec<u64>,
    pub source: String,
    pub error: Option<String>,
}

impl GameSummary {
    /// A zeroed summary, used when a game has no live streams or could not be resolved.
    pub fn empty(game_name: &str, source: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            game_name: game_name.to_string(),
            timestamp,
            total_viewers: 0,
            stream_count: 0,
            average_viewers_per_stream: 0.0,
            top_streamer: TOP_STREAMER_NOT_FOUND.to_string(),
            top_stream_viewers: 0,
            top_5_viewers: Vec::new(),
            source: source.to_string(),
            error: None,
        }
    }

    /// A zeroed summary carrying the cause of a failed collection.
    pub fn failed(
        game_name: &str,
        source: &str,
        timestamp: DateTime<Utc>,
        error: impl ToString,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(game_name, source, timestamp)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stream_count == 0
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Reduces a game's stream records into a [`GameSummary`].
///
/// Ties for the top stream go to the record seen first.
pub fn summarize(
    game_name: &str,
    source: &str,
    streams: &[HelixStream],
    timestamp: DateTime<Utc>,
) -> GameSummary {
    let mut top: Option<&HelixStream> = None;
    let mut total_viewers: u64 = 0;

    for stream in streams {
        total_viewers += stream.viewer_count;
        match top {
            Some(current) if current.viewer_count >= stream.viewer_count => {}
            _ => top = Some(stream),
        }
    }

    let Some(top) = top else {
        return GameSummary::empty(game_name, source, timestamp);
    };

    let stream_count = streams.len();
    GameSummary {
        game_name: game_name.to_string(),
        timestamp,
        total_viewers,
        stream_count,
        average_viewers_per_stream: round_2dp(total_viewers as f64 / stream_count as f64),
        top_streamer: top.user_name.clone(),
        top_stream_viewers: top.viewer_count,
        top_5_viewers: streams
            .iter()
            .take(TOP_VIEWERS_LEN)
            .map(|s| s.viewer_count)
            .collect(),
        source: source.to_string(),
        error: None,
    }
}

/// Rounds to 2 decimal places, exact ties going to the even neighbour.
#[inline]
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Payload written next to each non-empty summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub streams: Vec<HelixStream>,
    pub metadata: GameSummary,
}

impl RawSnapshot {
    pub fn new(streams: &[HelixStream], metadata: &GameSummary) -> Self {
        Self {
            streams: streams.iter().take(RAW_SNAPSHOT_STREAMS).cloned().collect(),
            metadata: metadata.clone(),
        }
    }
}
