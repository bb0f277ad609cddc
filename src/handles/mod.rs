// src/handles/mod.rs
//! Capability-scoped handles derived from the platform client.

pub mod auth;
pub mod database;
pub mod storage;

pub use auth::{AuthHandle, AuthUser};
pub use database::DatabaseHandle;
pub use storage::StorageHandle;

use crate::app::AppInner;
use anyhow::{Context, Result};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{error, trace};

const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// The client a handle was derived from has been dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("platform client for this {0} handle has been released")]
pub struct ClientReleased(pub &'static str);

pub(crate) fn upgrade(app: &Weak<AppInner>, kind: &'static str) -> Result<Arc<AppInner>> {
    app.upgrade().ok_or_else(|| ClientReleased(kind).into())
}

/// Attach the API key and, when given, the caller's ID token. The key travels
/// in a header so it never ends up in a URL.
pub(crate) fn authorize(
    app: &AppInner,
    mut request: reqwest::RequestBuilder,
    id_token: Option<&str>,
) -> reqwest::RequestBuilder {
    request = request.header(API_KEY_HEADER, app.config().api_key.expose());
    if let Some(token) = id_token {
        request = request.bearer_auth(token);
    }
    request
}

/// Send and hand back the successful response, or bail with the body of the error.
pub(crate) async fn send(request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to call {}", what))?;

    let status = response.status();
    trace!("{} responded with {}", what, status);

    if status.is_success() {
        Ok(response)
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        error!("{} error response: {}", what, error_text);
        anyhow::bail!("{} failed with status {}: {}", what, status, error_text)
    }
}

pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<serde_json::Value> {
    send(request, what)
        .await?
        .json()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to parse {} response", what))
}

/// Percent-encode `segments` onto `base`, dropping a trailing slash first.
pub(crate) fn join_segments<'a, I>(base: &str, segments: I) -> Result<reqwest::Url>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = reqwest::Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Base URL cannot carry a path: {}", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
