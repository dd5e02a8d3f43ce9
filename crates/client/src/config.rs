use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const BACKEND_URL: &str = "TIMETABLE__BACKEND__URL";
pub const EXPORT_DIR: &str = "TIMETABLE__EXPORT__DIR";
pub const CONNECT_TIMEOUT: &str = "TIMETABLE__HTTP__CONNECT_TIMEOUT_SECS";
pub const LOG_JSON: &str = "TIMETABLE__LOG__JSON";

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Error, PartialEq)]
#[error("{var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub backend_url: Url,
    pub export_dir: PathBuf,
    pub connect_timeout: Duration,
    pub json_logs: bool,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or blank keys take defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let raw_url = get(BACKEND_URL).unwrap_or_else(|| DEFAULT_BACKEND_URL.into());
        let backend_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError {
            var: BACKEND_URL,
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(backend_url.scheme(), "http" | "https") {
            return Err(ConfigError {
                var: BACKEND_URL,
                value: raw_url,
                reason: "expected an http or https url".into(),
            });
        }

        let connect_timeout = match get(CONNECT_TIMEOUT) {
            None => Duration::from_secs(10),
            Some(v) => match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError {
                        var: CONNECT_TIMEOUT,
                        value: v,
                        reason: "expected a positive number of seconds".into(),
                    })
                }
            },
        };

        let json_logs = match get(LOG_JSON).map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError {
                        var: LOG_JSON,
                        value: v,
                        reason: "expected a boolean".into(),
                    })
                }
            },
        };

        Ok(Self {
            backend_url,
            export_dir: get(EXPORT_DIR).map(PathBuf::from).unwrap_or_else(|| ".".into()),
            connect_timeout,
            json_logs,
        })
    }
}
