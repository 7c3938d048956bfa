//! Connection settings for the REST backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE_ID: &str = "(default)";
pub const DEFAULT_DOCUMENT_ENDPOINT: &str = "https://firestore.googleapis.com";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

/// Settings shared by [`RestStore`](crate::RestStore) and
/// [`RestObjectStore`](crate::RestObjectStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Cloud project id.
    pub project_id: String,
    /// Document database id.
    pub database_id: String,
    /// Object storage bucket (e.g. `my-app.appspot.com`).
    pub storage_bucket: String,
    /// Web API key sent as the `key` query parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Bearer token for authenticated requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Base URL of the document database REST API.
    pub document_endpoint: String,
    /// Base URL of the object storage REST API.
    pub storage_endpoint: String,
    /// How often polling listeners re-run their query.
    pub poll_interval_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            storage_bucket: String::new(),
            api_key: None,
            auth_token: None,
            document_endpoint: DEFAULT_DOCUMENT_ENDPOINT.to_string(),
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            poll_interval_ms: 5_000,
            request_timeout_secs: 30,
        }
    }
}

impl CloudConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage_bucket = bucket.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resource prefix of every document: `projects/{p}/databases/{d}/documents`.
    pub fn documents_resource(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }
}
