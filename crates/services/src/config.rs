use std::env;

use quiz_core::DEFAULT_AUTO_ADVANCE_MS;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DATA_BASE_URL: &str = "data";
pub const DEFAULT_DB_URL: &str = "sqlite:quiz.sqlite3";

/// Runtime settings for hosts, read from `QUIZ_*` environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizConfig {
    /// Base for question set locations: an `http(s)` URL or a directory.
    pub data_base_url: String,
    pub db_url: String,
    pub auto_advance_ms: u64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            data_base_url: DEFAULT_DATA_BASE_URL.to_owned(),
            db_url: DEFAULT_DB_URL.to_owned(),
            auto_advance_ms: DEFAULT_AUTO_ADVANCE_MS,
        }
    }
}

impl QuizConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let data_base_url = get("QUIZ_DATA_BASE_URL").unwrap_or(defaults.data_base_url);
        if is_remote(&data_base_url) && Url::parse(&data_base_url).is_err() {
            return Err(ConfigError::InvalidBaseUrl(data_base_url));
        }

        let db_url = get("QUIZ_DB_URL").unwrap_or(defaults.db_url);

        let auto_advance_ms = match get("QUIZ_AUTO_ADVANCE_MS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                name: "QUIZ_AUTO_ADVANCE_MS",
                raw,
            })?,
            None => defaults.auto_advance_ms,
        };

        Ok(Self {
            data_base_url,
            db_url,
            auto_advance_ms,
        })
    }

    #[must_use]
    pub fn data_is_remote(&self) -> bool {
        is_remote(&self.data_base_url)
    }
}

fn is_remote(base: &str) -> bool {
    base.starts_with("http://") || base.starts_with("https://")
}
