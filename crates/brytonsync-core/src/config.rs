//! Run configuration.
//!
//! Every setting is read once at process start into an immutable [`Config`]
//! that is handed to each component. Nothing below this module touches the
//! process environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default location of the cached Ride with GPS token, relative to the
/// working directory of the process.
pub const DEFAULT_TOKEN_FILE: &str = "rwGPSToken.key";

/// Default Ride with GPS host.
pub const DEFAULT_RWGPS_BASE_URL: &str = "https://ridewithgps.com";

/// Default ntfy host.
pub const DEFAULT_NTFY_BASE_URL: &str = "https://ntfy.sh";

/// HTTP request timeout when `HTTP_TIMEOUT_SECS` is not set.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Nextcloud (WebDAV) side of the sync.
#[derive(Clone)]
pub struct CloudConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub remote_folder: String,
    pub done_folder: String,
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_folder", &self.remote_folder)
            .field("done_folder", &self.done_folder)
            .finish()
    }
}

/// Ride with GPS account used for token exchange and uploads.
#[derive(Clone)]
pub struct Credential {
    pub email: String,
    pub password: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cloud: CloudConfig,
    pub rwgps: Credential,
    pub rwgps_base_url: String,
    pub ntfy_base_url: String,
    pub notify_topic: String,
    pub local_folder: PathBuf,
    pub token_file: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// All missing required keys are collected and reported in a single error
    /// so an operator can fix the `.env` file in one pass.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |key: &'static str| -> String {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(value) => value,
                None => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let cloud = CloudConfig {
            base_url: required("NEXTCLOUD_URL"),
            username: required("USERNAME"),
            password: required("PASSWORD"),
            remote_folder: required("REMOTE_FOLDER"),
            done_folder: required("REMOTE_DONE_FOLDER"),
        };
        let local_folder = required("LOCAL_FOLDER");
        let notify_topic = required("NOTIFY_CHANNEL");
        let rwgps = Credential {
            email: required("RWGPS_USER"),
            password: required("RWGPS_PASS"),
            api_key: required("RWGPS_APIK"),
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            cloud,
            rwgps,
            rwgps_base_url: lookup("RWGPS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_RWGPS_BASE_URL.to_string()),
            ntfy_base_url: lookup("NTFY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NTFY_BASE_URL.to_string()),
            notify_topic,
            local_folder: PathBuf::from(local_folder),
            token_file: lookup("RWGPS_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            http_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        [
            ("NEXTCLOUD_URL", "https://cloud.example.org"),
            ("USERNAME", "rider"),
            ("PASSWORD", "hunter2"),
            ("REMOTE_FOLDER", "Fitness"),
            ("REMOTE_DONE_FOLDER", "Done"),
            ("LOCAL_FOLDER", "/tmp/brytonsync"),
            ("NOTIFY_CHANNEL", "rides"),
            ("RWGPS_USER", "rider@example.org"),
            ("RWGPS_PASS", "secret"),
            ("RWGPS_APIK", "key123"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_lookup_applies_defaults() {
        let env = full_env();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.cloud.remote_folder, "Fitness");
        assert_eq!(config.rwgps.api_key, "key123");
        assert_eq!(config.rwgps_base_url, DEFAULT_RWGPS_BASE_URL);
        assert_eq!(config.ntfy_base_url, DEFAULT_NTFY_BASE_URL);
        assert_eq!(config.token_file, PathBuf::from(DEFAULT_TOKEN_FILE));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_lookup_reports_every_missing_key() {
        let mut env = full_env();
        env.remove("PASSWORD");
        env.remove("RWGPS_APIK");
        env.insert("NOTIFY_CHANNEL", "   ".to_string());

        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec!["PASSWORD", "NOTIFY_CHANNEL", "RWGPS_APIK"])
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let mut env = full_env();
        env.insert("HTTP_TIMEOUT_SECS", "soon".to_string());

        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HTTP_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_credential_debug_hides_secrets() {
        let env = full_env();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("key123"));
        assert!(!rendered.contains("hunter2"));
    }
}
