// src/handles/database.rs
use super::{authorize, join_segments, send_json, upgrade};
use crate::app::AppInner;
use crate::config::PlatformConfig;
use anyhow::Result;
use std::sync::Weak;
use tracing::info;

pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Document database handle. Addresses documents; the document shape is the
/// caller's business.
#[derive(Debug)]
pub struct DatabaseHandle {
    app: Weak<AppInner>,
    project_id: String,
    database_id: String,
    base_url: String,
}

impl DatabaseHandle {
    pub(crate) fn new(app: Weak<AppInner>, config: &PlatformConfig) -> Self {
        Self {
            app,
            project_id: config.project_id.clone(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            base_url: config.client.endpoints.firestore.clone(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// False once the owning client has been dropped.
    pub fn is_live(&self) -> bool {
        self.app.strong_count() > 0
    }

    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }

    /// URL of one document. `path` alternates collection and document ids
    /// (`users/alice`, `users/alice/orders/42`).
    pub fn document_url(&self, path: &str) -> Result<reqwest::Url> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || segments.len() % 2 != 0 {
            anyhow::bail!(
                "Document path must have an even number of segments: {:?}",
                path
            );
        }
        join_segments(&self.documents_url(), segments)
    }

    /// Fetch one document as the raw JSON the service returns.
    pub async fn get_document(
        &self,
        path: &str,
        id_token: Option<&str>,
    ) -> Result<serde_json::Value> {
        let app = upgrade(&self.app, "database")?;
        let url = self.document_url(path)?;

        info!("Fetching document {} from project {}", path, self.project_id);

        let request = authorize(&app, app.http().get(url), id_token);
        send_json(request, "document fetch").await
    }
}
