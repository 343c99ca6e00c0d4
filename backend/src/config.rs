use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be an unsigned integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub persist_path: Option<PathBuf>,
    pub admin_password: String,
    /// When set, a draw refuses to run unless exactly this many participants
    /// are registered.
    pub expected_participants: Option<usize>,
    /// Fixed seed for reproducible draws.
    pub draw_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            persist_path: None,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            expected_participants: None,
            draw_seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            persist_path: lookup("PERSIST_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            admin_password: lookup("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            expected_participants: parse_opt("EXPECTED_PARTICIPANTS", lookup("EXPECTED_PARTICIPANTS"))?,
            draw_seed: parse_opt("DRAW_SEED", lookup("DRAW_SEED"))?,
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                name,
                value: value.to_string(),
            }),
    }
}
