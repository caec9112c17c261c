use std::{
    env,
    fmt::Display,
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

pub const ADMIN_ACCESS_TOKEN: &str = "ADMIN_ACCESS_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to read secret {name}: {source}")]
    Secret { name: String, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub project_id: Option<String>,
    pub identity_url: String,
    pub documents_url: String,
    pub users_collection: String,
    pub request_timeout: Duration,
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            project_id: None,
            identity_url: "https://identitytoolkit.googleapis.com".to_string(),
            documents_url: "https://firestore.googleapis.com".to_string(),
            users_collection: "users".to_string(),
            request_timeout: Duration::from_millis(5000),
            access_token: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let secrets_dir: PathBuf = try_load("SECRETS_DIR", "/run/secrets")?;

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            project_id: var("ADMIN_PROJECT_ID").ok().filter(|id| !id.trim().is_empty()),
            identity_url: try_load("IDENTITY_URL", "https://identitytoolkit.googleapis.com")?,
            documents_url: try_load("DOCUMENTS_URL", "https://firestore.googleapis.com")?,
            users_collection: try_load("USERS_COLLECTION", "users")?,
            request_timeout: Duration::from_millis(try_load("REQUEST_TIMEOUT_MS", "5000")?),
            access_token: read_optional_secret(&secrets_dir, ADMIN_ACCESS_TOKEN)?,
        })
    }

    /// Both the project id and the admin credential are needed before any
    /// store client can be built.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (self.project_id.as_deref(), self.access_token.as_deref()) {
            (Some(project_id), Some(token)) => Some((project_id, token)),
            _ => None,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        debug!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_value(
        key,
        var(key).unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }),
    )
}

fn parse_value<T: FromStr>(key: &str, raw: String) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

/// A missing secret file is not an error; the admin clients simply stay
/// uninitialized. Any other read failure is.
fn read_optional_secret(dir: &Path, secret_name: &str) -> Result<Option<String>, ConfigError> {
    let path = dir.join(secret_name);

    match read_to_string(&path) {
        Ok(contents) => {
            let secret = contents.trim().to_string();
            if secret.is_empty() {
                warn!("Secret {secret_name} is empty");
                return Ok(None);
            }
            Ok(Some(secret))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Secret {secret_name} not found at {}", path.display());
            Ok(None)
        }
        Err(source) => Err(ConfigError::Secret {
            name: secret_name.to_string(),
            source,
        }),
    }
}
