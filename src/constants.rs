pub const API_HELIX_URL: &str = "https://api.twitch.tv/helix";
pub const API_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

pub const HELIX_URN_GAMES: &str = "games";
pub const HELIX_URN_TOP_GAMES: &str = "games/top";
pub const HELIX_URN_STREAMS: &str = "streams";

/// Largest `first` value helix accepts on paginated endpoints
pub const HELIX_PAGE_SIZE: usize = 100;

pub const SOURCE_TWITCH: &str = "twitch";
pub const TOP_STREAMER_NOT_FOUND: &str = "Not Found";

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const MIN_REQUEST_INTERVAL_MS: u64 = 1000;
pub const AUTH_MAX_RETRIES: u32 = 3;
pub const MAX_STREAMS: usize = 500;
pub const MAX_WORKERS: usize = 5;
pub const TRENDING_LIMIT: usize = 20;

/// Number of raw stream records kept in a persisted snapshot
pub const RAW_SNAPSHOT_STREAMS: usize = 20;
pub const TOP_VIEWERS_LEN: usize = 5;

pub const RAW_DATA_DIR: &str = "data/raw";
pub const PROCESSED_DATA_DIR: &str = "data/processed";
pub const FILE_TIMESTAMP_FMT: &str = "%Y%m%d_%H%M%S";

pub const DEFAULT_LOG_FILTER: &str = "trendwatch=info,warn";

pub const GAMES_TO_TRACK: [&str; 10] = [
    // recent releases
    "Helldivers 2",
    "Palworld",
    "Lethal Company",
    "Pizza Tower",
    "Balatro",
    "Content Warning",
    "Buckshot Roulette",
    // control group
    "Minecraft",
    "Fortnite",
    "League of Legends",
];
