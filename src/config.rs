//! Configuration manager for passgate.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port to listen on.
pub const DEFAULT_PORT: u16 = 1111;

// Demo fallbacks matching the reference deployment. Never use in production.
const FALLBACK_TOKEN_SECRET: &str = "demo-jwt-secret";
const FALLBACK_WORD_SECRET: &str = "demo-secret-key";
const FALLBACK_MFA_SECRET: &str = "demo-mfa-secret";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Port to listen on.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Signing and HMAC secrets.
    #[serde(skip_serializing, default)]
    pub secrets: Secrets,
}

/// Secrets as written in the configuration file. Each one may also come from
/// the environment, which takes precedence.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secrets {
    /// Key for signing bearer tokens (`JWT_SECRET`).
    pub token: Option<String>,
    /// Key for secure-word derivation (`SECURE_WORD_SECRET`).
    pub secure_word: Option<String>,
    /// Key for MFA code derivation (`MFA_SECRET`).
    pub mfa: Option<String>,
}

/// Secrets resolved once at startup for runtime use.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyring {
    pub token: String,
    pub secure_word: String,
    pub mfa: String,
}

fn resolve(env_key: &str, configured: Option<&str>, fallback: &'static str) -> String {
    if let Ok(value) = std::env::var(env_key) {
        return value;
    }
    if let Some(value) = configured {
        return value.to_owned();
    }

    tracing::warn!(%env_key, "secret missing, using insecure demo fallback");
    fallback.to_owned()
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Resolve every secret: environment variable first, then the
    /// configuration file, then the insecure demo fallback.
    pub fn keyring(&self) -> Keyring {
        Keyring {
            token: resolve("JWT_SECRET", self.secrets.token.as_deref(), FALLBACK_TOKEN_SECRET),
            secure_word: resolve(
                "SECURE_WORD_SECRET",
                self.secrets.secure_word.as_deref(),
                FALLBACK_WORD_SECRET,
            ),
            mfa: resolve("MFA_SECRET", self.secrets.mfa.as_deref(), FALLBACK_MFA_SECRET),
        }
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(mut config) => {
                    // set app version.
                    config.version = VERSION.to_owned();
                    Arc::new(config)
                }
                Err(err) => Arc::new(self.error(err)),
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_configuration_file() {
        let yaml = r"
name: passgate-dev
port: 4000
secrets:
  secure_word: local-word-key
";
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.name, "passgate-dev");
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.secrets.secure_word.as_deref(), Some("local-word-key"));
        assert_eq!(config.secrets.token, None);
    }

    #[test]
    fn keyring_prefers_file_over_fallback() {
        let config = Configuration {
            secrets: Secrets {
                token: Some("file-token-key".into()),
                secure_word: None,
                mfa: None,
            },
            ..Default::default()
        };
        let keyring = config.keyring();

        assert_eq!(keyring.token, "file-token-key");
        // unset entries fall back to the demo values.
        assert_eq!(keyring.secure_word, FALLBACK_WORD_SECRET);
        assert_eq!(keyring.mfa, FALLBACK_MFA_SECRET);
    }
}
