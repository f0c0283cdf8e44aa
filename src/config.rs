//! Application-level configuration loading: hub limits, the superuser and the token table.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::identity::{Identity, StaticIdentityProvider};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/hub.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HUB_BACK_CONFIG_PATH";

const DEFAULT_MAX_ACTIVE_ROOMS: usize = 5;
const DEFAULT_PAYING_MEMBER_THRESHOLD: usize = 6;
const DEFAULT_CODE_ATTEMPTS: usize = 16;
const DEFAULT_SUPERUSER_EMAIL: &str = "darwin47@elprivado.app";
const DEFAULT_MY_ROOMS_LIMIT: usize = 10;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Ceiling on simultaneously active rooms.
    pub max_active_rooms: usize,
    /// Paying members after which newcomers start exempt.
    pub paying_member_threshold: usize,
    /// Random draws per code before giving up.
    pub code_attempts: usize,
    pub superuser_email: String,
    /// Rooms returned by the "my rooms" listing.
    pub my_rooms_limit: usize,
    identities: Vec<(String, Identity)>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        identities = app_config.identities.len(),
                        max_active_rooms = app_config.max_active_rooms,
                        "loaded hub config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build the bearer-token provider from the configured identities.
    pub fn identity_provider(&self) -> StaticIdentityProvider {
        StaticIdentityProvider::new(self.identities.iter().cloned())
    }

    /// Replace the identity table.
    pub fn with_identities(mut self, identities: impl IntoIterator<Item = (String, Identity)>) -> Self {
        self.identities = identities.into_iter().collect();
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_active_rooms: DEFAULT_MAX_ACTIVE_ROOMS,
            paying_member_threshold: DEFAULT_PAYING_MEMBER_THRESHOLD,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            superuser_email: DEFAULT_SUPERUSER_EMAIL.to_owned(),
            my_rooms_limit: DEFAULT_MY_ROOMS_LIMIT,
            identities: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_active_rooms: Option<usize>,
    paying_member_threshold: Option<usize>,
    code_attempts: Option<usize>,
    superuser_email: Option<String>,
    my_rooms_limit: Option<usize>,
    #[serde(default)]
    identities: Vec<RawIdentity>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_active_rooms: value.max_active_rooms.unwrap_or(defaults.max_active_rooms),
            paying_member_threshold: value
                .paying_member_threshold
                .unwrap_or(defaults.paying_member_threshold),
            code_attempts: value
                .code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.code_attempts),
            superuser_email: value.superuser_email.unwrap_or(defaults.superuser_email),
            my_rooms_limit: value.my_rooms_limit.unwrap_or(defaults.my_rooms_limit),
            identities: value.identities.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single token entry inside the configuration file.
struct RawIdentity {
    token: String,
    #[serde(flatten)]
    identity: Identity,
}

impl From<RawIdentity> for (String, Identity) {
    fn from(value: RawIdentity) -> Self {
        (value.token, value.identity)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "max_active_rooms": 3,
                "code_attempts": 0,
                "identities": [
                    {"token": "t1", "uid": "u1", "email": "ana@example.com", "display_name": "Ana"}
                ]
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.max_active_rooms, 3);
        assert_eq!(config.code_attempts, DEFAULT_CODE_ATTEMPTS);
        assert_eq!(config.paying_member_threshold, 6);
        assert_eq!(config.superuser_email, "darwin47@elprivado.app");
        assert_eq!(config.identity_provider().len(), 1);
    }
}
