use clap::{Parser, Subcommand};

use trendwatch::constants::{MAX_WORKERS, TRENDING_LIMIT};

#[derive(Parser, Debug)]
#[command(version, about = "Collects twitch viewership for tracked games")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect every tracked game concurrently
    Collect {
        /// Game to collect (repeatable); defaults to GAMES_TO_TRACK
        #[arg(short, long = "game")]
        games: Vec<String>,

        /// Maximum concurrent collections
        #[arg(short, long, default_value_t = MAX_WORKERS)]
        workers: usize,

        /// Cap on streams fetched per game; defaults to MAX_STREAMS
        #[arg(short, long)]
        max_streams: Option<usize>,

        /// Don't write raw snapshots or the batch summary
        #[arg(long)]
        no_save: bool,
    },

    /// Collect a single game
    Game {
        name: String,

        #[arg(long)]
        no_save: bool,
    },

    /// List the current top games on twitch
    Trending {
        #[arg(short, long, default_value_t = TRENDING_LIMIT)]
        limit: usize,
    },
}

pub fn parse_cli_args() -> Cli {
    Cli::parse()
}
