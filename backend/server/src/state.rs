use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::{
    config::{Config, ConfigError},
    documents::{DocumentStore, HttpDocumentStore},
    error::{AppError, StoreError},
    identity::{HttpIdentityStore, IdentityStore},
};

/// Privileged handles to the managed services.
#[derive(Clone)]
pub struct Admin {
    pub identity: Arc<dyn IdentityStore>,
    pub documents: Arc<dyn DocumentStore>,
}

pub struct State {
    pub config: Config,
    pub admin: Option<Admin>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build admin HTTP client: {0}")]
    Client(#[from] StoreError),
}

impl State {
    pub fn new() -> Result<Arc<Self>, InitError> {
        let config = Config::load()?;
        let admin = init_admin(&config)?;

        Ok(Self::with_admin(config, admin))
    }

    pub fn with_admin(config: Config, admin: Option<Admin>) -> Arc<Self> {
        Arc::new(Self { config, admin })
    }

    pub fn admin(&self) -> Result<&Admin, AppError> {
        self.admin.as_ref().ok_or(AppError::Uninitialized)
    }
}

/// Builds both store clients once for the whole process. Missing
/// credentials leave the admin handles unset rather than failing startup.
pub fn init_admin(config: &Config) -> Result<Option<Admin>, StoreError> {
    let Some((project_id, access_token)) = config.admin_credentials() else {
        warn!("Admin credentials missing, account routes will report uninitialized");
        return Ok(None);
    };

    let client = Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.request_timeout)
        .build()?;

    info!(
        project_id,
        identity_url = %config.identity_url,
        documents_url = %config.documents_url,
        "Admin clients initialized"
    );

    Ok(Some(Admin {
        identity: Arc::new(HttpIdentityStore::new(
            client.clone(),
            &config.identity_url,
            project_id,
            access_token,
        )),
        documents: Arc::new(HttpDocumentStore::new(
            client,
            &config.documents_url,
            project_id,
            access_token,
        )),
    }))
}
