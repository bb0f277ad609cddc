// src/app.rs
//! The platform client: one validated configuration, one HTTP connection pool
//! and the three service handles derived from them.

use crate::config::PlatformConfig;
use crate::error::{BootstrapError, BootstrapResult};
use crate::handles::{AuthHandle, DatabaseHandle, StorageHandle};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::info;

pub(crate) struct AppInner {
    config: PlatformConfig,
    http: reqwest::Client,
    database: Arc<DatabaseHandle>,
    storage: Arc<StorageHandle>,
    auth: Arc<AuthHandle>,
}

impl AppInner {
    pub(crate) fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Cheap to clone; every clone refers to the same client.
#[derive(Clone)]
pub struct PlatformApp {
    inner: Arc<AppInner>,
}

impl PlatformApp {
    /// Validate `config` and build the client with its handles.
    ///
    /// Handles only keep a weak reference back to the client, so dropping the
    /// last `PlatformApp` releases the connection pool.
    pub(crate) fn new(config: PlatformConfig) -> BootstrapResult<Self> {
        let config = config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.client.timeout_seconds))
            .user_agent(config.client.user_agent.clone())
            .build()
            .map_err(|e| BootstrapError::client(e.to_string()))?;

        let inner = Arc::new_cyclic(|weak: &Weak<AppInner>| AppInner {
            database: Arc::new(DatabaseHandle::new(weak.clone(), &config)),
            storage: Arc::new(StorageHandle::new(weak.clone(), &config)),
            auth: Arc::new(AuthHandle::new(weak.clone(), &config)),
            config,
            http,
        });

        info!(
            "Platform client initialized for project {}",
            inner.config.project_id
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.inner.config
    }

    pub fn project_id(&self) -> &str {
        &self.inner.config.project_id
    }

    pub fn database(&self) -> Arc<DatabaseHandle> {
        Arc::clone(&self.inner.database)
    }

    pub fn storage(&self) -> Arc<StorageHandle> {
        Arc::clone(&self.inner.storage)
    }

    pub fn auth(&self) -> Arc<AuthHandle> {
        Arc::clone(&self.inner.auth)
    }

    /// Identity comparison: true when both values refer to the same client.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[cfg(test)]
    pub(crate) fn inner_for_tests(&self) -> Arc<AppInner> {
        Arc::clone(&self.inner)
    }
}

impl fmt::Debug for PlatformApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformApp")
            .field("project_id", &self.inner.config.project_id)
            .field("app_id", &self.inner.config.app_id)
            .finish_non_exhaustive()
    }
}
