// src/handles/storage.rs
use super::{authorize, join_segments, send, send_json, upgrade};
use crate::app::AppInner;
use crate::config::PlatformConfig;
use anyhow::{Context, Result};
use std::sync::Weak;
use tracing::info;

/// Blob storage handle bound to the configured bucket.
#[derive(Debug)]
pub struct StorageHandle {
    app: Weak<AppInner>,
    bucket: String,
    base_url: String,
}

impl StorageHandle {
    pub(crate) fn new(app: Weak<AppInner>, config: &PlatformConfig) -> Self {
        Self {
            app,
            bucket: config.effective_storage_bucket(),
            base_url: config.client.endpoints.storage.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn is_live(&self) -> bool {
        self.app.strong_count() > 0
    }

    /// Metadata URL of an object. The whole object name is one path segment,
    /// so `/` inside it is percent-encoded.
    pub fn object_url(&self, name: &str) -> Result<reqwest::Url> {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            anyhow::bail!("Object name must not be empty");
        }
        join_segments(&self.base_url, ["b", self.bucket.as_str(), "o", name])
    }

    pub fn download_url(&self, name: &str) -> Result<reqwest::Url> {
        let mut url = self.object_url(name)?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    pub async fn get_metadata(
        &self,
        name: &str,
        id_token: Option<&str>,
    ) -> Result<serde_json::Value> {
        let app = upgrade(&self.app, "storage")?;
        let url = self.object_url(name)?;

        let request = authorize(&app, app.http().get(url), id_token);
        send_json(request, "object metadata fetch").await
    }

    pub async fn download(&self, name: &str, id_token: Option<&str>) -> Result<Vec<u8>> {
        let app = upgrade(&self.app, "storage")?;
        let url = self.download_url(name)?;

        info!("Downloading {} from bucket {}", name, self.bucket);

        let request = authorize(&app, app.http().get(url), id_token);
        let bytes = send(request, "object download")
            .await?
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to read object body: {}", name))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::test_server::StubServer;

    fn handle(config: PlatformConfig) -> StorageHandle {
        StorageHandle::new(Weak::new(), &config)
    }

    #[test]
    fn test_default_bucket() {
        let storage = handle(PlatformConfig::new("k1", "p1", "1:1:web:ab"));
        assert_eq!(storage.bucket(), "p1.firebasestorage.app");
    }

    #[test]
    fn test_object_urls() {
        let storage = handle(
            PlatformConfig::new("k1", "p1", "1:1:web:ab").with_storage_bucket("p1.appspot.com"),
        );

        assert_eq!(
            storage.object_url("/profiles/alice/avatar.png").unwrap().as_str(),
            "https://firebasestorage.googleapis.com/v0/b/p1.appspot.com/o/profiles%2Falice%2Favatar.png"
        );
        assert_eq!(
            storage.download_url("report 1.pdf").unwrap().as_str(),
            "https://firebasestorage.googleapis.com/v0/b/p1.appspot.com/o/report%201.pdf?alt=media"
        );
        assert!(storage.object_url("/").is_err());
    }

    #[tokio::test]
    async fn test_download_without_client() {
        let storage = handle(PlatformConfig::new("k1", "p1", "1:1:web:ab"));
        assert!(storage.download("a.txt", None).await.is_err());
        assert!(!storage.is_live());
    }

    #[tokio::test]
    async fn test_metadata_and_download_over_http() {
        let server = StubServer::start(200, r#"{"name":"docs/a.txt","size":"2"}"#).await;
        let app = server.app();
        let storage = app.storage();

        let metadata = storage.get_metadata("docs/a.txt", None).await.unwrap();
        assert_eq!(metadata["size"], "2");

        let bytes = storage.download("docs/a.txt", Some("id-token")).await.unwrap();
        assert_eq!(bytes, br#"{"name":"docs/a.txt","size":"2"}"#.to_vec());

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0]
            .to_lowercase()
            .starts_with("get /v0/b/p1.firebasestorage.app/o/docs%2fa.txt http/1.1"));

        let download = requests[1].to_lowercase();
        assert!(download.starts_with("get /v0/b/p1.firebasestorage.app/o/docs%2fa.txt?alt=media http/1.1"));
        assert!(download.contains("x-goog-api-key: k1"));
        assert!(download.contains("authorization: bearer id-token"));
    }

    #[tokio::test]
    async fn test_download_denied() {
        let server = StubServer::start(401, r#"{"error":{"code":401}}"#).await;
        let app = server.app();

        let err = app.storage().download("private.bin", None).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
