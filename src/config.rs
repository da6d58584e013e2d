//! Process configuration, read from the environment (and `.env`).

use std::env;
use std::fmt;
use std::time::Duration;

use crate::assigner::MIN_INTERVAL;
use crate::error::{Error, Result};

pub struct Config {
    pub hcloud_token: String,
    pub hcloud_endpoint: Option<String>,
    /// Floor applied to every pool's reconciliation interval. Never below
    /// [`MIN_INTERVAL`].
    pub min_interval: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("hcloud_token", &"<redacted>")
            .field("hcloud_endpoint", &self.hcloud_endpoint)
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let hcloud_token = non_empty("HCLOUD_API_TOKEN")
            .or_else(|| non_empty("HCLOUD_TOKEN"))
            .ok_or_else(|| {
                Error::Config("Missing environment variable HCLOUD_TOKEN".to_string())
            })?;

        let min_interval = match non_empty("MIN_INTERVAL_SECONDS") {
            Some(raw) => match raw.parse::<u64>().map(Duration::from_secs) {
                Ok(interval) if interval >= MIN_INTERVAL => interval,
                _ => {
                    return Err(Error::Config(format!(
                        "MIN_INTERVAL_SECONDS must be an integer of at least {}, got {raw}",
                        MIN_INTERVAL.as_secs()
                    )))
                }
            },
            None => MIN_INTERVAL,
        };

        Ok(Self {
            hcloud_token,
            hcloud_endpoint: non_empty("HCLOUD_ENDPOINT"),
            min_interval,
        })
    }
}
