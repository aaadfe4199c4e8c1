//! Process configuration read from the environment (and a `.env` file, if present).
//!
//! Values are deserialized straight into [`Env`] through a small serde deserializer over
//! `(key, value)` string pairs, so fields can carry `rename`/`default` attributes and numeric
//! values are parsed in place.

use std::iter::empty;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::{
    API_AUTH_URL, API_HELIX_URL, AUTH_MAX_RETRIES, DEFAULT_LOG_FILTER, GAMES_TO_TRACK, MAX_STREAMS,
    MIN_REQUEST_INTERVAL_MS, PROCESSED_DATA_DIR, RAW_DATA_DIR, REQUEST_TIMEOUT_SECS,
};

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Loads the process configuration on first call and hands out the same instance afterwards.
pub async fn env() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub twitch_client_id: String,
    pub twitch_client_secret: String,

    #[serde(default = "default_helix_url")]
    pub helix_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_raw_dir")]
    pub raw_data_dir: PathBuf,
    #[serde(default = "default_processed_dir")]
    pub processed_data_dir: PathBuf,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_interval")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_retries")]
    pub auth_max_retries: u32,
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,

    #[serde(default = "default_games")]
    pub games_to_track: Vec<String>,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub log_json: bool,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(from_env::<Env>()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

fn default_helix_url() -> String {
    API_HELIX_URL.to_string()
}

fn default_auth_url() -> String {
    API_AUTH_URL.to_string()
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from(RAW_DATA_DIR)
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from(PROCESSED_DATA_DIR)
}

fn default_timeout() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_interval() -> u64 {
    MIN_REQUEST_INTERVAL_MS
}

fn default_retries() -> u32 {
    AUTH_MAX_RETRIES
}

fn default_max_streams() -> usize {
    MAX_STREAMS
}

fn default_games() -> Vec<String> {
    GAMES_TO_TRACK.iter().map(|g| g.to_string()).collect()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ---
//  Deserializer implementation
// ---

/// A single variable's value, tagged with its key for error messages.
struct Val(String, String);
struct Key(String);

struct Vars<Iter: Iterator<Item = (String, String)>>(Iter);

struct Deserializer<'de, Iter: Iterator<Item = (String, String)>> {
    inner: MapDeserializer<'de, Vars<Iter>, EnvDeserializeError>,
}

impl<Iter: Iterator<Item = (String, String)>> Iterator for Vars<Iter> {
    type Item = (Key, Val);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (Key(k.clone()), Val(k, v)))
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Key {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! forward_parsed_vals {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.1.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{}: while parsing '{}' (variable: {})",
                        e, self.1, self.0
                    ))),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    /// Lists are comma-separated; surrounding whitespace on each item is dropped
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.trim().is_empty() {
            SeqDeserializer::new(empty::<Val>()).deserialize_seq(visitor)
        } else {
            let key = self.0;
            let values = self
                .1
                .split(',')
                .map(|v| Val(key.clone(), v.trim().to_owned()))
                .collect::<Vec<_>>();
            SeqDeserializer::new(values.into_iter()).deserialize_seq(visitor)
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_parsed_vals! {
        bool => deserialize_bool,
        u8 => deserialize_u8,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
        f64 => deserialize_f64,
    }

    serde::forward_to_deserialize_any! {
        i8 i16 f32 char str string unit bytes byte_buf map
        unit_struct tuple_struct identifier tuple
        ignored_any struct enum
    }
}

impl<'de> de::Deserializer<'de> for Key {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map newtype_struct
        unit_struct tuple_struct identifier tuple ignored_any
        bool u8 u16 u32 u64 u128 i8 i16 i32 i64 i128 f32 f64 enum struct
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> Deserializer<'de, Iter> {
    fn new(vars: Iter) -> Self {
        Deserializer {
            inner: MapDeserializer::new(Vars(vars)),
        }
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> de::Deserializer<'de>
    for Deserializer<'de, Iter>
{
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 u128 i8 i16 i32 i64 i128
        f32 f64 enum struct
    }
}

/// Deserializes `T` from the process environment, loading `.env` first.
pub fn from_env<T>() -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
{
    from_iter(dotenvy::vars())
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    T::deserialize(Deserializer::new(iter.into_iter()))
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.to_uppercase())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing required variable: {0}")]
    MissingValue(String),
}
