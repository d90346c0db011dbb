use crate::FetchError;
use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://exercisedb-api.vercel.app/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_SEARCH_PAGE_SIZE: u32 = 25;

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
    pub page_size: u32,
    pub search_page_size: u32,
    pub sync_limit: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            sync_limit: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Reads configuration through `get` so tests never touch the process
    /// environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, FetchError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base_url = get("EXERCISE_CATALOG_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();
        let api_key = get("EXERCISE_CATALOG_API_KEY")
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::new(k.into()));
        let timeout_secs = parse_positive(
            "EXERCISE_CATALOG_TIMEOUT_SECS",
            get("EXERCISE_CATALOG_TIMEOUT_SECS"),
        )?
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let page_size = parse_positive(
            "EXERCISE_CATALOG_PAGE_SIZE",
            get("EXERCISE_CATALOG_PAGE_SIZE"),
        )?
        .map(|v| v as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE);
        let sync_limit = parse_positive(
            "EXERCISE_CATALOG_SYNC_LIMIT",
            get("EXERCISE_CATALOG_SYNC_LIMIT"),
        )?
        .map(|v| v as u32);

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
            page_size,
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            sync_limit,
        })
    }
}

fn parse_positive(key: &str, raw: Option<String>) -> Result<Option<u64>, FetchError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(FetchError::Config(format!("{key} must be greater than zero"))),
        Ok(v) => Ok(Some(u64::from(v))),
        Err(_) => Err(FetchError::Config(format!("{key} is not a number: {raw}"))),
    }
}
