//! Object store backed by the vendor storage REST API.
//!
//! Objects are addressed as `{endpoint}/v0/b/{bucket}/o/{path}` with the
//! path percent-encoded as a single segment. Metadata responses carry
//! `downloadTokens`; a token turns the object URL into a public download
//! URL.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::error::StorageError;
use super::{ObjectMetadata, ObjectStore};
use crate::config::CloudConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// [`ObjectStore`] speaking the vendor storage REST API.
#[derive(Clone)]
pub struct RestObjectStore {
    config: CloudConfig,
    client: reqwest::Client,
}

impl RestObjectStore {
    pub fn new(config: CloudConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { config, client })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/v0/b/{}/o",
            self.config.storage_endpoint.trim_end_matches('/'),
            self.config.storage_bucket
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.bucket_url(), urlencoding::encode(path))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn metadata(&self, resource: ObjectResource) -> ObjectMetadata {
        let download_url = resource
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|token| !token.is_empty())
            .map(|token| {
                format!(
                    "{}?alt=media&token={}",
                    self.object_url(&resource.name),
                    urlencoding::encode(token)
                )
            });
        ObjectMetadata {
            size: resource
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            path: resource.name,
            content_type: resource.content_type,
            download_url,
        }
    }
}

async fn check(response: Response, path: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::ObjectNotFound(path.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ObjectStore for RestObjectStore {
    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        debug!("Looking up download URL for {}", path);
        let response = self
            .authorize(self.client.get(self.object_url(path)))
            .send()
            .await?;
        let resource: ObjectResource = check(response, path)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Protocol(e.to_string()))?;
        self.metadata(resource)
            .download_url
            .ok_or_else(|| StorageError::Protocol(format!("no download token for {}", path)))
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        let size = bytes.len();
        let response = self
            .authorize(self.client.post(self.bucket_url()))
            .query(&[("name", path)])
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        let resource: ObjectResource = check(response, path)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Protocol(e.to_string()))?;
        info!("Uploaded {} ({} bytes)", path, size);
        Ok(self.metadata(resource))
    }
}
