use std::sync::Arc;
use std::time::Duration;

use http::header::InvalidHeaderValue;
use http::StatusCode;
use leaky_bucket::RateLimiter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::constants::{HELIX_PAGE_SIZE, HELIX_URN_GAMES, HELIX_URN_STREAMS, HELIX_URN_TOP_GAMES};
use crate::util::env::Env;

pub mod session;
pub mod types;


pub use session::{Credential, SessionCache};
use types::{HelixDataResponse, HelixGame, HelixStream};

/// Connection settings for one helix source
#[derive(Debug, Clone)]
pub struct HelixConfig {
    pub client_id: String,
    pub client_secret: String,
    pub helix_url: String,
    pub auth_url: String,
    pub timeout: Duration,
    pub min_request_interval: Duration,
    pub auth_max_retries: u32,
}

impl From<&Env> for HelixConfig {
    fn from(env: &Env) -> Self {
        Self {
            client_id: env.twitch_client_id.clone(),
            client_secret: env.twitch_client_secret.clone(),
            helix_url: env.helix_url.clone(),
            auth_url: env.auth_url.clone(),
            timeout: env.request_timeout(),
            min_request_interval: env.min_request_interval(),
            auth_max_retries: env.auth_max_retries,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum HelixUri {
    Games,
    TopGames,
    Streams,
}

impl HelixUri {
    fn urn(self) -> &'static str {
        match self {
            HelixUri::Games => HELIX_URN_GAMES,
            HelixUri::TopGames => HELIX_URN_TOP_GAMES,
            HelixUri::Streams => HELIX_URN_STREAMS,
        }
    }
}

/// Authenticated helix client.
///
/// Clones share the same credential cache and the same request pacing, so every collector
/// built from one client behaves as a single API consumer.
#[derive(Clone)]
pub struct HelixClient {
    http: reqwest::Client,
    config: Arc<HelixConfig>,
    session: Arc<SessionCache>,
    limiter: Arc<RateLimiter>,
}

impl HelixClient {
    pub fn new(config: HelixConfig) -> HelixResult<Self> {
        Self::with_session(config, Arc::new(SessionCache::new()))
    }

    /// Builds a client around an existing credential cache.
    pub fn with_session(config: HelixConfig, session: Arc<SessionCache>) -> HelixResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        // leaky-bucket rejects a zero refill interval
        let interval = config.min_request_interval.max(Duration::from_millis(1));
        let limiter = RateLimiter::builder()
            .initial(1)
            .max(1)
            .refill(1)
            .interval(interval)
            .build();

        Ok(Self {
            http,
            config: Arc::new(config),
            session,
            limiter: Arc::new(limiter),
        })
    }

    pub fn config(&self) -> &HelixConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionCache> {
        &self.session
    }

    fn url(&self, uri: HelixUri) -> String {
        format!("{}/{}", self.config.helix_url.trim_end_matches('/'), uri.urn())
    }

    /// Looks up games by exact name.
    pub async fn games_by_name(&self, name: &str) -> HelixResult<Vec<HelixGame>> {
        let res: HelixDataResponse<HelixGame> = self
            .get(HelixUri::Games, &[("name", name.to_string())])
            .await?;
        Ok(res.data)
    }

    /// Fetches a single page of live streams for a game, continuing from `after` if given.
    pub async fn streams_page(
        &self,
        game_id: &str,
        after: Option<&str>,
    ) -> HelixResult<HelixDataResponse<HelixStream>> {
        let mut query = vec![
            ("game_id", game_id.to_string()),
            ("first", HELIX_PAGE_SIZE.to_string()),
        ];
        if let Some(cursor) = after {
            query.push(("after", cursor.to_string()));
        }

        self.get(HelixUri::Streams, &query).await
    }

    /// Current top games, in the order helix ranks them.
    pub async fn top_games(&self, limit: usize) -> HelixResult<Vec<HelixGame>> {
        let first = limit.clamp(1, HELIX_PAGE_SIZE);
        let res: HelixDataResponse<HelixGame> = self
            .get(HelixUri::TopGames, &[("first", first.to_string())])
            .await?;
        Ok(res.data)
    }

    #[instrument(skip(self, query))]
    /// Performs an authenticated GET against a helix endpoint and parses the body as `T`.
    ///
    /// Every call waits on the shared rate limiter before going out.
    async fn get<T>(&self, uri: HelixUri, query: &[(&str, String)]) -> HelixResult<T>
    where
        T: DeserializeOwned,
    {
        let headers = self.ensure_session().await?;
        self.limiter.acquire_one().await;

        let res = self
            .http
            .get(self.url(uri))
            .headers(headers)
            .query(query)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            // token was revoked or expired early; drop it so the next call renews
            tracing::warn!(code = %status, "helix rejected credential");
            self.session.invalidate();
            return Err(HelixErr::Unauthorized);
        }

        if !status.is_success() {
            tracing::error!(code = %status, "non-2xx helix response");
            let message = res
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body["message"].as_str().map(str::to_string));

            return Err(HelixErr::FetchErr {
                status: status.as_u16(),
                message: message.unwrap_or_default(),
            });
        }

        if let Some(remaining) = res.headers().get("ratelimit-remaining")
            && let Some(total) = res.headers().get("ratelimit-limit")
        {
            tracing::debug!(ratelimit_available = ?remaining, ratelimit_total = ?total, "rate-limit bucket");
        }

        Ok(res.json::<T>().await?)
    }
}

pub type HelixResult<T> = core::result::Result<T, HelixErr>;

#[derive(Debug, Error)]
pub enum HelixErr {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("while creating a HeaderValue ({0})")]
    HeaderError(#[from] InvalidHeaderValue),

    #[error("helix rejected the access token")]
    Unauthorized,

    #[error("error during helix fetch ({status}): {message}")]
    FetchErr { status: u16, message: String },

    #[error("failed to authenticate after {attempts} attempts: {source}")]
    Authentication {
        attempts: u32,
        #[source]
        source: Box<HelixErr>,
    },
}
