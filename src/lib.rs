//! Process-wide bootstrap for the hosted backend platform.
//!
//! Build a [`PlatformConfig`] (environment, TOML file or code), call
//! [`initialize`] once at startup, then fetch the shared handles anywhere:
//!
//! ```no_run
//! use firebase_bootstrap::{database, initialize, PlatformConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! initialize(PlatformConfig::load()?)?;
//! let db = database()?;
//! println!("{}", db.documents_url());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handles;

pub use app::PlatformApp;
pub use bootstrap::{app, auth, database, initialize, is_initialized, storage, Bootstrap};
pub use config::{ApiKey, ClientOptions, Endpoints, PlatformConfig};
pub use error::{BootstrapError, BootstrapResult};
pub use handles::{AuthHandle, AuthUser, ClientReleased, DatabaseHandle, StorageHandle};
