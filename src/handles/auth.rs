// src/handles/auth.rs
use super::{authorize, send, send_json, upgrade};
use crate::app::AppInner;
use crate::config::PlatformConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Weak;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Published signing keys are refetched after this many seconds.
const SIGNING_KEYS_TTL_SECS: i64 = 3600;
/// An unknown `kid` forces a refetch at most this often.
const MIN_REFETCH_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    aud: String,
    iss: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    email_verified: bool,
    exp: usize,
    iat: usize,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            email_verified: claims.email_verified,
        }
    }
}

#[derive(Debug)]
struct SigningKeys {
    set: JwkSet,
    fetched_at: DateTime<Utc>,
}

impl SigningKeys {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::seconds(SIGNING_KEYS_TTL_SECS)
    }

    fn may_refetch(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at > Duration::seconds(MIN_REFETCH_INTERVAL_SECS)
    }
}

/// Authentication handle: verifies ID tokens issued for the project and
/// passes account lookups through to the identity service.
#[derive(Debug)]
pub struct AuthHandle {
    app: Weak<AppInner>,
    project_id: String,
    auth_domain: String,
    identity_url: String,
    signing_keys_url: String,
    keys: RwLock<Option<SigningKeys>>,
    refetch: Mutex<()>,
}

impl AuthHandle {
    pub(crate) fn new(app: Weak<AppInner>, config: &PlatformConfig) -> Self {
        let endpoints = &config.client.endpoints;
        Self {
            app,
            project_id: config.project_id.clone(),
            auth_domain: config.effective_auth_domain(),
            identity_url: endpoints.identity.trim_end_matches('/').to_string(),
            signing_keys_url: endpoints.signing_keys.clone(),
            keys: RwLock::new(None),
            refetch: Mutex::new(()),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn auth_domain(&self) -> &str {
        &self.auth_domain
    }

    pub fn is_live(&self) -> bool {
        self.app.strong_count() > 0
    }

    /// Expected `iss` claim of the project's ID tokens.
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Fetch the published JWK set used to sign ID tokens. Returns the number of keys.
    pub async fn refresh_signing_keys(&self) -> Result<usize> {
        let app = upgrade(&self.app, "auth")?;

        let set: JwkSet = send(app.http().get(&self.signing_keys_url), "signing key fetch")
            .await?
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to parse signing keys")?;

        let count = set.keys.len();
        self.install_signing_keys(set).await;
        info!("Updated {} token signing keys", count);

        Ok(count)
    }

    /// Replace the cached key set, e.g. with keys served by a local emulator.
    pub async fn install_signing_keys(&self, set: JwkSet) {
        *self.keys.write().await = Some(SigningKeys {
            set,
            fetched_at: Utc::now(),
        });
    }

    pub async fn signing_keys_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.keys.read().await.as_ref().map(|keys| keys.fetched_at)
    }

    /// Verify an ID token: RS256, audience is the project, issuer is
    /// [`AuthHandle::issuer`], signed by a currently published key.
    ///
    /// Keys are refetched when stale. A token naming an unknown `kid` forces a
    /// refetch only when the cached set is older than a minute, and concurrent
    /// verifications share one fetch.
    pub async fn verify_id_token(&self, token: &str) -> Result<AuthUser> {
        let header = decode_header(token).context("Malformed token header")?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow::anyhow!("Missing kid in token header"))?;

        let decoding_key = match self.decoding_key(&kid).await? {
            Some(key) => key,
            None => {
                let _refetch = self.refetch.lock().await;
                if let Some(key) = self.decoding_key(&kid).await? {
                    key
                } else {
                    if !self.refetch_allowed().await {
                        anyhow::bail!("Unknown key ID: {}", kid);
                    }
                    self.refresh_signing_keys().await?;
                    self.decoding_key(&kid)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Unknown key ID: {}", kid))?
                }
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[self.issuer()]);

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            warn!("ID token rejected: {}", e);
            anyhow::anyhow!("Token verification failed: {}", e)
        })?;

        if token_data.claims.sub.is_empty() {
            anyhow::bail!("Token has an empty subject");
        }

        Ok(token_data.claims.into())
    }

    async fn refetch_allowed(&self) -> bool {
        match &*self.keys.read().await {
            Some(keys) => keys.may_refetch(Utc::now()),
            None => true,
        }
    }

    // None when there are no fresh keys or the kid is not among them.
    async fn decoding_key(&self, kid: &str) -> Result<Option<DecodingKey>> {
        let guard = self.keys.read().await;
        let keys = match &*guard {
            Some(keys) if !keys.is_stale(Utc::now()) => keys,
            _ => return Ok(None),
        };

        keys.set
            .find(kid)
            .map(|jwk| DecodingKey::from_jwk(jwk).context("Unusable signing key"))
            .transpose()
    }

    /// Pass-through of the identity service account lookup, raw JSON.
    pub async fn lookup_account(&self, id_token: &str) -> Result<serde_json::Value> {
        let app = upgrade(&self.app, "auth")?;
        let url = format!("{}/accounts:lookup", self.identity_url);

        let request = authorize(&app, app.http().post(url), None)
            .json(&serde_json::json!({ "idToken": id_token }));
        send_json(request, "account lookup").await
    }
}
