// src/config.rs
use crate::error::{BootstrapError, BootstrapResult};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PROJECT_ID_MAX_LEN: usize = 30;
const APP_PLATFORMS: [&str; 3] = ["web", "android", "ios"];

/// API key wrapper that never prints its value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Base URLs of the platform's REST surfaces. Overridden for emulators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub firestore: String,
    pub storage: String,
    pub identity: String,
    pub signing_keys: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            firestore: "https://firestore.googleapis.com/v1".to_string(),
            storage: "https://firebasestorage.googleapis.com/v0".to_string(),
            identity: "https://identitytoolkit.googleapis.com/v1".to_string(),
            signing_keys:
                "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
                    .to_string(),
        }
    }
}

impl Endpoints {
    /// Route surfaces to local emulators. Each address is one emulator's
    /// `host:port` (scheme optional); `None` leaves that surface unchanged.
    ///
    /// The signing key URL is never rerouted: the auth emulator issues
    /// unsigned tokens that [`crate::AuthHandle::verify_id_token`] rejects.
    pub fn with_emulators(
        mut self,
        firestore: Option<&str>,
        storage: Option<&str>,
        auth: Option<&str>,
    ) -> Self {
        if let Some(address) = firestore {
            self.firestore = format!("{}/v1", emulator_base(address));
        }
        if let Some(address) = storage {
            self.storage = format!("{}/v0", emulator_base(address));
        }
        if let Some(address) = auth {
            self.identity = format!(
                "{}/identitytoolkit.googleapis.com/v1",
                emulator_base(address)
            );
        }
        self
    }
}

fn emulator_base(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            endpoints: Endpoints::default(),
        }
    }
}

/// Connection parameters of one platform project.
///
/// Field names follow the web config object (`apiKey`, `projectId`, ...);
/// snake_case spellings are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(alias = "api_key")]
    pub api_key: ApiKey,
    #[serde(alias = "auth_domain")]
    pub auth_domain: Option<String>,
    #[serde(alias = "project_id")]
    pub project_id: String,
    #[serde(alias = "storage_bucket")]
    pub storage_bucket: Option<String>,
    #[serde(alias = "messaging_sender_id")]
    pub messaging_sender_id: Option<String>,
    #[serde(alias = "app_id")]
    pub app_id: String,
    #[serde(alias = "measurement_id")]
    pub measurement_id: Option<String>,
    pub client: ClientOptions,
}

impl PlatformConfig {
    pub fn new(
        api_key: impl Into<ApiKey>,
        project_id: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    pub fn with_auth_domain(mut self, domain: impl Into<String>) -> Self {
        self.auth_domain = Some(domain.into());
        self
    }

    pub fn with_storage_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage_bucket = Some(bucket.into());
        self
    }

    pub fn with_messaging_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.messaging_sender_id = Some(sender_id.into());
        self
    }

    pub fn with_measurement_id(mut self, measurement_id: impl Into<String>) -> Self {
        self.measurement_id = Some(measurement_id.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.client.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.client.timeout_seconds = seconds;
        self
    }

    /// Pick a source: the file named by `FIREBASE_CONFIG`, else the process environment.
    pub fn load() -> Result<Self> {
        match std::env::var("FIREBASE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                Self::from_file(Path::new(&path), &Self::get_environment())
            }
            _ => Ok(Self::from_env()),
        }
    }

    fn get_environment() -> String {
        std::env::var("FIREBASE_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    /// Read `FIREBASE_*` variables. Missing values stay empty and are
    /// rejected later by [`PlatformConfig::validate`].
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoints = Endpoints::default().with_emulators(
            optional("FIRESTORE_EMULATOR_HOST").as_deref(),
            optional("FIREBASE_STORAGE_EMULATOR_HOST").as_deref(),
            optional("FIREBASE_AUTH_EMULATOR_HOST").as_deref(),
        );

        Self {
            api_key: ApiKey::new(lookup("FIREBASE_API_KEY").unwrap_or_default()),
            auth_domain: optional("FIREBASE_AUTH_DOMAIN"),
            project_id: lookup("FIREBASE_PROJECT_ID").unwrap_or_default(),
            storage_bucket: optional("FIREBASE_STORAGE_BUCKET"),
            messaging_sender_id: optional("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: lookup("FIREBASE_APP_ID").unwrap_or_default(),
            measurement_id: optional("FIREBASE_MEASUREMENT_ID"),
            client: ClientOptions {
                endpoints,
                ..ClientOptions::default()
            },
        }
    }

    /// Load one environment section (`[local]`, `[production]`, ...) of a TOML file.
    pub fn from_file(path: &Path, environment: &str) -> Result<Self> {
        info!(
            "Loading platform configuration for environment {} from {}",
            environment,
            path.display()
        );

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content, environment)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Only the selected section is deserialized; other sections may hold
    /// anything.
    pub fn from_toml(content: &str, environment: &str) -> Result<Self> {
        let mut sections: toml::Table = toml::from_str(content).context("Failed to parse TOML")?;

        sections
            .remove(environment)
            .ok_or_else(|| anyhow::anyhow!("No [{}] section in configuration", environment))?
            .try_into()
            .with_context(|| format!("Invalid [{}] section", environment))
    }

    /// Check every field and normalize optional ones. Never touches the network.
    pub fn validate(mut self) -> BootstrapResult<Self> {
        self.project_id = self.project_id.trim().to_string();
        self.app_id = self.app_id.trim().to_string();
        self.api_key = ApiKey::new(self.api_key.expose().trim());
        self.auth_domain = normalize_optional(self.auth_domain);
        self.storage_bucket = normalize_optional(self.storage_bucket);
        self.messaging_sender_id = normalize_optional(self.messaging_sender_id);
        self.measurement_id = normalize_optional(self.measurement_id);

        if self.api_key.is_blank() {
            return Err(BootstrapError::configuration("apiKey", "is required"));
        }
        if self.api_key.expose().chars().any(char::is_whitespace) {
            return Err(BootstrapError::configuration(
                "apiKey",
                "must not contain whitespace",
            ));
        }

        validate_project_id(&self.project_id)?;

        if let Some(domain) = &self.auth_domain {
            validate_host("authDomain", domain)?;
        }
        if let Some(bucket) = &self.storage_bucket {
            validate_host("storageBucket", bucket)?;
        }
        if let Some(sender) = &self.messaging_sender_id {
            if !is_digits(sender) {
                return Err(BootstrapError::configuration(
                    "messagingSenderId",
                    format!("expected digits, got {:?}", sender),
                ));
            }
        }

        validate_app_id(&self.app_id, self.messaging_sender_id.as_deref())?;

        let endpoints = &self.client.endpoints;
        for (field, url) in [
            ("client.endpoints.firestore", &endpoints.firestore),
            ("client.endpoints.storage", &endpoints.storage),
            ("client.endpoints.identity", &endpoints.identity),
            ("client.endpoints.signing_keys", &endpoints.signing_keys),
        ] {
            validate_endpoint(field, url)?;
        }

        if self.client.timeout_seconds == 0 {
            return Err(BootstrapError::configuration(
                "client.timeout_seconds",
                "must be greater than zero",
            ));
        }

        Ok(self)
    }

    pub fn effective_auth_domain(&self) -> String {
        self.auth_domain
            .clone()
            .unwrap_or_else(|| format!("{}.firebaseapp.com", self.project_id))
    }

    pub fn effective_storage_bucket(&self) -> String {
        self.storage_bucket
            .clone()
            .unwrap_or_else(|| format!("{}.firebasestorage.app", self.project_id))
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn validate_project_id(project_id: &str) -> BootstrapResult<()> {
    if project_id.is_empty() {
        return Err(BootstrapError::configuration("projectId", "is required"));
    }
    if project_id.len() > PROJECT_ID_MAX_LEN {
        return Err(BootstrapError::configuration(
            "projectId",
            format!("longer than {} characters", PROJECT_ID_MAX_LEN),
        ));
    }
    if !project_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(BootstrapError::configuration(
            "projectId",
            "must start with a lowercase letter",
        ));
    }
    if project_id.ends_with('-') {
        return Err(BootstrapError::configuration(
            "projectId",
            "must not end with a hyphen",
        ));
    }
    if !project_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(BootstrapError::configuration(
            "projectId",
            "only lowercase letters, digits and hyphens are allowed",
        ));
    }
    Ok(())
}

fn validate_host(field: &'static str, host: &str) -> BootstrapResult<()> {
    if host.contains("://") {
        return Err(BootstrapError::configuration(
            field,
            "expected a bare host name without scheme",
        ));
    }
    if host.contains('/') || host.chars().any(char::is_whitespace) {
        return Err(BootstrapError::configuration(
            field,
            format!("{:?} is not a host name", host),
        ));
    }
    Ok(())
}

// Shape is `<version>:<sender id>:<platform>:<hash>`.
fn validate_app_id(app_id: &str, sender_id: Option<&str>) -> BootstrapResult<()> {
    if app_id.is_empty() {
        return Err(BootstrapError::configuration("appId", "is required"));
    }

    let parts: Vec<&str> = app_id.split(':').collect();
    let [version, sender, platform, hash] = parts.as_slice() else {
        return Err(BootstrapError::configuration(
            "appId",
            "expected <version>:<sender>:<platform>:<hash>",
        ));
    };

    if !is_digits(version) || !is_digits(sender) {
        return Err(BootstrapError::configuration(
            "appId",
            "version and sender segments must be numeric",
        ));
    }
    if !APP_PLATFORMS.contains(platform) {
        return Err(BootstrapError::configuration(
            "appId",
            format!("unknown platform {:?}", platform),
        ));
    }
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BootstrapError::configuration(
            "appId",
            "hash segment must be hexadecimal",
        ));
    }
    if let Some(expected) = sender_id {
        if expected != *sender {
            return Err(BootstrapError::configuration(
                "appId",
                format!("sender {} does not match messagingSenderId {}", sender, expected),
            ));
        }
    }
    Ok(())
}

fn validate_endpoint(field: &'static str, url: &str) -> BootstrapResult<()> {
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        BootstrapError::configuration(field, format!("invalid URL {:?}: {}", url, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BootstrapError::configuration(
            field,
            format!("unsupported scheme {:?}", parsed.scheme()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> PlatformConfig {
        PlatformConfig::new("k1", "p1", "1:302693543482:web:e11edce2a238c368cc4f03")
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = valid().validate().unwrap();
        assert_eq!(config.project_id, "p1");
        assert_eq!(config.effective_auth_domain(), "p1.firebaseapp.com");
        assert_eq!(config.effective_storage_bucket(), "p1.firebasestorage.app");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = PlatformConfig::new("k1", "  ", "1:1:web:ab")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "projectId", .. }));

        let err = PlatformConfig::new("", "p1", "1:1:web:ab").validate().unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "apiKey", .. }));

        let err = PlatformConfig::new("k1", "p1", "").validate().unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "appId", .. }));
    }

    #[test]
    fn test_project_id_rules() {
        for bad in ["P1", "1project", "proj-", "proj_ect", "a234567890123456789012345678901"] {
            let err = PlatformConfig::new("k1", bad, "1:1:web:ab").validate();
            assert!(err.is_err(), "{} should be rejected", bad);
        }
        assert!(PlatformConfig::new("k1", "rdsgestion-b3ec6", "1:1:web:ab")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_hosts_must_be_bare() {
        let err = valid()
            .with_auth_domain("https://p1.firebaseapp.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "authDomain", .. }));

        let err = valid()
            .with_storage_bucket("p1.appspot.com/files")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "storageBucket", .. }));
    }

    #[test]
    fn test_app_id_sender_must_match() {
        let err = valid()
            .with_messaging_sender_id("42")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration { field: "appId", .. }));

        assert!(valid()
            .with_messaging_sender_id("302693543482")
            .validate()
            .is_ok());
        assert!(PlatformConfig::new("k1", "p1", "1:1:desktop:ab").validate().is_err());
        assert!(PlatformConfig::new("k1", "p1", "1:1:web").validate().is_err());
    }

    #[test]
    fn test_blank_optionals_are_dropped() {
        let config = valid()
            .with_auth_domain("   ")
            .with_storage_bucket("")
            .validate()
            .unwrap();
        assert_eq!(config.auth_domain, None);
        assert_eq!(config.storage_bucket, None);
    }

    #[test]
    fn test_endpoint_overrides_are_checked() {
        let mut endpoints = Endpoints::default().with_emulators(
            Some("127.0.0.1:8080"),
            Some("http://127.0.0.1:9199/"),
            Some("127.0.0.1:9099"),
        );
        assert_eq!(endpoints.firestore, "http://127.0.0.1:8080/v1");
        assert_eq!(endpoints.storage, "http://127.0.0.1:9199/v0");
        assert_eq!(
            endpoints.identity,
            "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1"
        );
        assert_eq!(endpoints.signing_keys, Endpoints::default().signing_keys);
        assert!(valid().with_endpoints(endpoints.clone()).validate().is_ok());

        endpoints.storage = "ftp://example.com".to_string();
        let err = valid().with_endpoints(endpoints).validate().unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Configuration { field: "client.endpoints.storage", .. }
        ));

        assert!(valid().with_timeout(0).validate().is_err());
    }

    #[test]
    fn test_api_key_is_redacted() {
        let rendered = format!("{:?}", valid());
        assert!(rendered.contains("ApiKey(***)"));
        assert!(!rendered.contains("\"k1\""));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FIREBASE_API_KEY", "k1"),
            ("FIREBASE_PROJECT_ID", "p1"),
            ("FIREBASE_APP_ID", "1:1:web:ab"),
            ("FIREBASE_STORAGE_BUCKET", " "),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8080"),
        ]
        .into_iter()
        .collect();

        let config = PlatformConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.api_key.expose(), "k1");
        assert_eq!(config.storage_bucket, None);
        assert_eq!(config.client.endpoints.firestore, "http://localhost:8080/v1");
        assert_eq!(config.client.endpoints.storage, Endpoints::default().storage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_selects_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[local]
apiKey = "local-key"
projectId = "demo-local"
appId = "1:1:web:ab"

[local.client]
timeout_seconds = 5

[local.client.endpoints]
firestore = "http://127.0.0.1:8080/v1"

[production]
api_key = "prod-key"
project_id = "rdsgestion-b3ec6"
app_id = "1:302693543482:web:e11edce2a238c368cc4f03"
messaging_sender_id = "302693543482"
"#
        )
        .unwrap();

        let local = PlatformConfig::from_file(file.path(), "local").unwrap();
        assert_eq!(local.project_id, "demo-local");
        assert_eq!(local.client.timeout_seconds, 5);
        assert_eq!(local.client.endpoints.firestore, "http://127.0.0.1:8080/v1");
        assert_eq!(local.client.endpoints.storage, Endpoints::default().storage);

        let production = PlatformConfig::from_file(file.path(), "production").unwrap();
        assert_eq!(production.api_key.expose(), "prod-key");
        assert!(production.validate().is_ok());

        assert!(PlatformConfig::from_file(file.path(), "staging").is_err());
    }

    #[test]
    fn test_other_sections_do_not_break_loading() {
        let content = r#"
title = "deployments"

[local]
apiKey = "local-key"
projectId = "demo-local"
appId = "1:1:web:ab"

[production]
projectId = 42
client = "not a table"
"#;

        let local = PlatformConfig::from_toml(content, "local").unwrap();
        assert_eq!(local.project_id, "demo-local");
        assert!(PlatformConfig::from_toml(content, "production").is_err());
        assert!(PlatformConfig::from_toml(content, "title").is_err());
    }
}
