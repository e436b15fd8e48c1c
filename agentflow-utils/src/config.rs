//! Small environment/config loading helpers shared across agentflow crates.

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use tracing::debug;

/// Reads an environment variable, returning an error if unset.
pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(UtilsError::Env)
}

/// Reads an environment variable, falling back to `default` if unset.
pub fn get_env_or(key: &str, default: impl Into<String>) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Reads and parses an environment variable via `FromStr`.
pub fn get_env_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key)?;
    raw.parse::<T>()
        .map_err(|e| UtilsError::InvalidInput(format!("{key}: {e}")))
}

/// Reads and parses an environment variable, falling back to `default`.
pub fn get_env_parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Loads a JSON config file into `T`.
pub fn load_json_config<T: DeserializeOwned>(path: &str) -> Result<T> {
    debug!(path, "loading json config");
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Loads a YAML config file into `T`.
pub fn load_yaml_config<T: DeserializeOwned>(path: &str) -> Result<T> {
    debug!(path, "loading yaml config");
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Implemented by configuration structs that can be built purely from
/// environment variables (credentials, endpoints, timeouts).
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self>;
}
