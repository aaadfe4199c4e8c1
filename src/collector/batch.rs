//! Concurrent collection over a list of games.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::instrument;

use super::Collector;
use crate::summary::GameSummary;

#[instrument(
    skip(collector, game_names),
    fields(source = collector.source(), games = game_names.len())
)]
/// Collects every game in `game_names` with at most `max_workers` collections in flight.
///
/// Each game runs in its own task. A collection that returns an error or panics becomes an
/// error summary for that game only; siblings keep running. The result holds exactly one
/// summary per input name, in the order the collections finished.
pub async fn collect_batch<C>(
    collector: Arc<C>,
    game_names: &[String],
    max_workers: usize,
) -> Vec<GameSummary>
where
    C: Collector + ?Sized + 'static,
{
    let source = collector.source().to_string();

    let tasks = game_names.iter().cloned().map(|game| {
        let collector = Arc::clone(&collector);
        async move {
            let handle = {
                let game = game.clone();
                tokio::spawn(async move { collector.collect_game_data(&game).await })
            };
            (game, handle.await)
        }
    });

    let results: Vec<GameSummary> = stream::iter(tasks)
        .buffer_unordered(max_workers.max(1))
        .map(|(game, joined)| match joined {
            Ok(Ok(summary)) => {
                tracing::debug!(game_name = game, "batch entry finished");
                summary
            }
            Ok(Err(e)) => {
                tracing::error!(game_name = game, error = %e, "error collecting game data");
                GameSummary::failed(&game, &source, Utc::now(), e)
            }
            Err(e) => {
                tracing::error!(game_name = game, error = %e, "collection task aborted");
                GameSummary::failed(&game, &source, Utc::now(), e)
            }
        })
        .collect()
        .await;

    tracing::debug!(collected = results.len(), "batch complete");
    results
}
