use std::sync::Arc;

use thiserror::Error;

use trendwatch::constants::SOURCE_TWITCH;
use trendwatch::prelude::*;
use trendwatch::storage::StorageErr;
use trendwatch::util::env::EnvErr;
use trendwatch::util::tracing::{TracingErr, build_subscriber};

mod args;

use args::Command;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Tracing(#[from] TracingErr),

    #[error(transparent)]
    Collector(#[from] CollectorErr),

    #[error(transparent)]
    Storage(#[from] StorageErr),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = args::parse_cli_args();
    let env = env().await?;
    build_subscriber(env)?;

    tracing::debug!(command = ?cli.command, "starting trendwatch");

    match cli.command {
        Command::Collect {
            games,
            workers,
            max_streams,
            no_save,
        } => {
            let games = if games.is_empty() {
                env.games_to_track.clone()
            } else {
                games
            };

            let mut collector = TwitchCollector::from_env(env)?
                .with_max_streams(max_streams.unwrap_or(env.max_streams));
            if no_save {
                collector = collector.without_persistence();
            }

            let results = Arc::new(collector).collect_batch(&games, workers).await;
            for summary in &results {
                print_summary(summary);
            }

            if !no_save {
                JsonFileStore::new(&env.raw_data_dir, &env.processed_data_dir)
                    .save_batch(SOURCE_TWITCH, &results)
                    .await?;
            }
        }

        Command::Game { name, no_save } => {
            let mut collector = TwitchCollector::from_env(env)?;
            if no_save {
                collector = collector.without_persistence();
            }

            let summary = collector.collect_game_data(&name).await?;
            print_summary(&summary);
        }

        Command::Trending { limit } => {
            let collector = TwitchCollector::from_env(env)?.without_persistence();
            let trending = collector.get_trending_games(limit).await;

            if trending.is_empty() {
                tracing::warn!("no trending games returned");
            }
            for (rank, game) in trending.iter().enumerate() {
                println!("{:>3}. {} ({})", rank + 1, game.name, game.id);
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &GameSummary) {
    println!("{}:", summary.game_name);
    if let Some(error) = &summary.error {
        println!("  error: {error}");
        return;
    }

    println!("  viewers: {}", summary.total_viewers);
    println!("  streams: {}", summary.stream_count);
    println!("  average: {:.2}", summary.average_viewers_per_stream);
    println!(
        "  top:     {} ({} viewers)",
        summary.top_streamer, summary.top_stream_viewers
    );
}
