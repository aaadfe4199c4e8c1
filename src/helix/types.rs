use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope shared by every helix response: a `data` array plus an optional pagination cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct HelixDataResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<HelixPagination>,
}

impl<T> HelixDataResponse<T> {
    /// The continuation cursor, if upstream returned a non-empty one.
    pub fn cursor(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.cursor.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelixPagination {
    pub cursor: Option<String>,
}

/// Response body of the client-credentials token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct HelixTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HelixGame {
    pub id: String,
    pub name: String,
}

/// One live stream as reported by `/streams`.
///
/// Only the fields the aggregation reads are typed; everything else upstream sends is kept in
/// `extra` so raw snapshots hold the record as it was received.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HelixStream {
    pub user_name: String,
    pub viewer_count: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HelixStream {
    pub fn new(user_name: impl Into<String>, viewer_count: u64) -> Self {
        Self {
            user_name: user_name.into(),
            viewer_count,
            extra: Map::new(),
        }
    }
}
