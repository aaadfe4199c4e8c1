//! App access token handling for the client-credentials flow.

use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use tracing::instrument;

use super::types::HelixTokenResponse;
use super::{HelixClient, HelixErr, HelixResult};

/// An app access token together with the headers every helix request carries.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub headers: HeaderMap,
}

impl Credential {
    pub fn new(token: &str, client_id: &str, expires_at: DateTime<Utc>) -> HelixResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        headers.insert("Client-Id", HeaderValue::from_str(client_id)?);

        Ok(Self {
            token: token.to_string(),
            expires_at,
            headers,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Credential shared between every collector of one source.
///
/// The lock only guards the read-check and the store; token requests happen outside it, so
/// two callers may race to refresh and the later write wins.
#[derive(Debug, Default)]
pub struct SessionCache {
    inner: RwLock<Option<Credential>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached credential, if one exists and has not expired.
    pub fn current(&self) -> Option<Credential> {
        let now = Utc::now();
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().filter(|c| c.is_valid_at(now)).cloned()
    }

    pub fn store(&self, credential: Credential) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(credential);
    }

    pub fn invalidate(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl HelixClient {
    #[instrument(skip(self))]
    /// Returns request headers for a valid session, exchanging client credentials for a new token
    /// when the cached one is missing or expired.
    ///
    /// Attempts are retried immediately up to the configured budget; the error returned after the
    /// last attempt wraps that attempt's cause.
    pub async fn ensure_session(&self) -> HelixResult<HeaderMap> {
        if let Some(credential) = self.session.current() {
            return Ok(credential.headers);
        }

        let attempts = self.config.auth_max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_token().await {
                Ok(credential) => {
                    tracing::info!(
                        attempt,
                        expires_at = %credential.expires_at,
                        "acquired helix app token"
                    );

                    let headers = credential.headers.clone();
                    self.session.store(credential);
                    return Ok(headers);
                }
                Err(e) if attempt >= attempts => {
                    tracing::error!(error = %e, attempts, "helix authentication failed");
                    return Err(HelixErr::Authentication {
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "auth attempt failed, retrying");
                }
            }
        }
    }

    async fn request_token(&self) -> HelixResult<Credential> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let body: HelixTokenResponse = self
            .http
            .post(&self.config.auth_url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let expires_at = Utc::now() + TimeDelta::seconds(body.expires_in.max(0));
        Credential::new(&body.access_token, &self.config.client_id, expires_at)
    }
}
