// src/bootstrap.rs
//! One-time construction of the platform client and process-wide access to
//! its handles.
//!
//! A second `initialize` always fails with [`BootstrapError::AlreadyInitialized`];
//! the first client stays in place. Concurrent callers block while the first
//! call constructs, so nobody observes a half-built client.

use crate::app::PlatformApp;
use crate::config::PlatformConfig;
use crate::error::{BootstrapError, BootstrapResult};
use crate::handles::{AuthHandle, DatabaseHandle, StorageHandle};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{error, warn};

/// Singleton holder for one platform client.
#[derive(Debug, Default)]
pub struct Bootstrap {
    app: OnceCell<PlatformApp>,
}

impl Bootstrap {
    pub const fn new() -> Self {
        Self {
            app: OnceCell::new(),
        }
    }

    /// Validate `config` and build the client. On failure nothing is stored,
    /// so a corrected configuration may be supplied afterwards.
    pub fn initialize(&self, config: PlatformConfig) -> BootstrapResult<PlatformApp> {
        let mut constructed = false;

        let app = self
            .app
            .get_or_try_init(|| {
                constructed = true;
                PlatformApp::new(config)
            })
            .map_err(|e| {
                error!("Platform client initialization failed: {}", e);
                e
            })?;

        if !constructed {
            warn!(
                "Rejected second initialization; project {} is already active",
                app.project_id()
            );
            return Err(BootstrapError::AlreadyInitialized);
        }

        Ok(app.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.app.get().is_some()
    }

    pub fn app(&self) -> BootstrapResult<PlatformApp> {
        self.app.get().cloned().ok_or(BootstrapError::NotInitialized)
    }

    pub fn database(&self) -> BootstrapResult<Arc<DatabaseHandle>> {
        self.app().map(|app| app.database())
    }

    pub fn storage(&self) -> BootstrapResult<Arc<StorageHandle>> {
        self.app().map(|app| app.storage())
    }

    pub fn auth(&self) -> BootstrapResult<Arc<AuthHandle>> {
        self.app().map(|app| app.auth())
    }
}

static GLOBAL: Bootstrap = Bootstrap::new();

/// Initialize the process-wide platform client.
pub fn initialize(config: PlatformConfig) -> BootstrapResult<PlatformApp> {
    GLOBAL.initialize(config)
}

pub fn is_initialized() -> bool {
    GLOBAL.is_initialized()
}

pub fn app() -> BootstrapResult<PlatformApp> {
    GLOBAL.app()
}

pub fn database() -> BootstrapResult<Arc<DatabaseHandle>> {
    GLOBAL.database()
}

pub fn storage() -> BootstrapResult<Arc<StorageHandle>> {
    GLOBAL.storage()
}

pub fn auth() -> BootstrapResult<Arc<AuthHandle>> {
    GLOBAL.auth()
}
