//! Document store backed by the vendor REST API.
//!
//! Documents live under `{endpoint}/v1/projects/{p}/databases/{db}/documents`.
//! The REST surface has no push channel, so listeners poll: each
//! registration spawns a task that re-runs its read every
//! [`CloudConfig::poll_interval`] and delivers the difference.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::diff::diff_results;
use super::error::{StoreError, StoreResult};
use super::path::DocumentRef;
use super::query::{Filter, FilterOp, Query};
use super::registration::ListenerRegistration;
use super::snapshot::{Document, DocumentSnapshot, Fields, QuerySnapshot};
use super::value::{decode_fields, encode_fields, encode_value, field_mask, field_path};
use super::{DocumentHandler, DocumentStore, FetchSource, QueryHandler};
use crate::config::CloudConfig;

struct RestInner {
    config: CloudConfig,
    client: reqwest::Client,
    /// Last known state of every document this client has read or written.
    cache: Mutex<HashMap<DocumentRef, Option<Fields>>>,
}

/// [`DocumentStore`] speaking the vendor REST API.
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestInner>,
}

impl RestStore {
    pub fn new(config: CloudConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            inner: Arc::new(RestInner {
                config,
                client,
                cache: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.inner.config
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<DocumentRef, Option<Fields>>> {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, reference: &DocumentRef, fields: Option<Fields>) {
        self.cache().insert(reference.clone(), fields);
    }

    fn root_url(&self) -> String {
        format!(
            "{}/v1/{}",
            self.inner.config.document_endpoint.trim_end_matches('/'),
            self.inner.config.documents_resource()
        )
    }

    fn document_url(&self, reference: &DocumentRef) -> String {
        let encoded: Vec<String> = reference
            .path()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.root_url(), encoded.join("/"))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.inner.client.request(method, url);
        if let Some(key) = &self.inner.config.api_key {
            builder = builder.query(&[("key", key)]);
        }
        if let Some(token) = &self.inner.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Turns a REST document resource into a [`Document`].
    fn parse_document(&self, resource: &Value) -> StoreResult<Document> {
        let name = resource
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::protocol("document without a name"))?;
        let prefix = format!("{}/", self.inner.config.documents_resource());
        let path = name
            .strip_prefix(&prefix)
            .ok_or_else(|| StoreError::protocol(format!("foreign document name: {}", name)))?;
        let reference = DocumentRef::parse(path)?;
        let fields = match resource.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields)?,
            None => Fields::new(),
        };
        Ok(Document::new(reference, fields))
    }

    async fn fetch(&self, reference: &DocumentRef) -> StoreResult<Option<Fields>> {
        let response = self
            .request(Method::GET, &self.document_url(reference))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            self.remember(reference, None);
            return Ok(None);
        }
        let body: Value = check(response).await?.json().await?;
        let document = self.parse_document(&body)?;
        self.remember(reference, Some(document.fields.clone()));
        Ok(Some(document.fields))
    }

    /// Runs a structured query and returns the matching documents in result
    /// order.
    pub async fn run_query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let Some(collection) = query.target() else {
            return Ok(Vec::new());
        };
        let parent_url = match collection.parent() {
            Some(parent) => self.document_url(&parent),
            None => self.root_url(),
        };

        let mut structured = json!({ "from": [{ "collectionId": collection.id() }] });
        if let Some(filter) = encode_filters(&query.filters) {
            structured["where"] = filter;
        }
        if let Some(limit) = query.limit {
            structured["limit"] = json!(limit);
        }

        let response = self
            .request(Method::POST, &format!("{}:runQuery", parent_url))
            .json(&json!({ "structuredQuery": structured }))
            .send()
            .await?;
        let rows: Vec<Value> = check(response).await?.json().await?;

        let mut documents = Vec::new();
        for row in rows {
            // Rows without a document only carry progress information.
            if let Some(resource) = row.get("document") {
                documents.push(self.parse_document(resource)?);
            }
        }

        {
            let mut cache = self.cache();
            for document in &documents {
                cache.insert(document.reference.clone(), Some(document.fields.clone()));
            }
        }

        Ok(documents)
    }

    fn runtime(&self) -> StoreResult<Handle> {
        Handle::try_current()
            .map_err(|_| StoreError::Unavailable("listening requires a Tokio runtime".to_string()))
    }
}

fn operator(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "EQUAL",
        FilterOp::NotEqual => "NOT_EQUAL",
        FilterOp::LessThan => "LESS_THAN",
        FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        FilterOp::GreaterThan => "GREATER_THAN",
        FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::In => "IN",
    }
}

fn encode_filter(filter: &Filter) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field_path(&filter.field) },
            "op": operator(filter.op),
            "value": encode_value(&filter.value),
        }
    })
}

fn encode_filters(filters: &[Filter]) -> Option<Value> {
    match filters {
        [] => None,
        [single] => Some(encode_filter(single)),
        many => Some(json!({
            "compositeFilter": {
                "op": "AND",
                "filters": many.iter().map(encode_filter).collect::<Vec<_>>(),
            }
        })),
    }
}

/// Maps an error status to [`StoreError::Api`], preferring the message in
/// the vendor's error envelope.
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
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
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn get(
        &self,
        reference: &DocumentRef,
        source: FetchSource,
    ) -> StoreResult<DocumentSnapshot> {
        match source {
            FetchSource::Server => {
                let fields = self.fetch(reference).await?;
                Ok(DocumentSnapshot {
                    reference: reference.clone(),
                    fields,
                    from_cache: false,
                })
            }
            FetchSource::Cache => match self.cache().get(reference) {
                Some(fields) => Ok(DocumentSnapshot {
                    reference: reference.clone(),
                    fields: fields.clone(),
                    from_cache: true,
                }),
                None => Err(StoreError::CacheMiss(reference.to_string())),
            },
        }
    }

    async fn set_merge(&self, reference: &DocumentRef, fields: Fields) -> StoreResult<()> {
        let mask = field_mask(&fields);
        if mask.is_empty() {
            // Without a mask a PATCH replaces the document, so an empty
            // merge only has to make sure the document exists.
            if self.fetch(reference).await?.is_some() {
                return Ok(());
            }
        }

        let params: Vec<(&str, &str)> = mask
            .iter()
            .map(|path| ("updateMask.fieldPaths", path.as_str()))
            .collect();
        let response = self
            .request(Method::PATCH, &self.document_url(reference))
            .query(&params)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;
        let document = self.parse_document(&body)?;
        self.remember(reference, Some(document.fields));
        debug!("Merged {} field(s) into {}", mask.len(), reference);
        Ok(())
    }

    async fn delete(&self, reference: &DocumentRef) -> StoreResult<()> {
        let response = self
            .request(Method::DELETE, &self.document_url(reference))
            .send()
            .await?;
        if response.status() != StatusCode::NOT_FOUND {
            check(response).await?;
        }
        self.remember(reference, None);
        Ok(())
    }

    fn listen_document(
        &self,
        reference: &DocumentRef,
        handler: DocumentHandler,
    ) -> ListenerRegistration {
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(err) => {
                handler(Err(err));
                return ListenerRegistration::inert();
            }
        };

        let store = self.clone();
        let reference = reference.clone();
        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(store.inner.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Option<Fields>> = None;
            loop {
                interval.tick().await;
                match store.fetch(&reference).await {
                    Ok(fields) => {
                        if last.as_ref() == Some(&fields) {
                            continue;
                        }
                        last = Some(fields.clone());
                        handler(Ok(DocumentSnapshot {
                            reference: reference.clone(),
                            fields,
                            from_cache: false,
                        }));
                    }
                    Err(err) => {
                        warn!("Polling {} failed: {}", reference, err);
                        handler(Err(err));
                    }
                }
            }
        });

        let abort = task.abort_handle();
        ListenerRegistration::new(move || abort.abort())
    }

    fn listen_query(&self, query: &Query, handler: QueryHandler) -> ListenerRegistration {
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(err) => {
                handler(Err(err));
                return ListenerRegistration::inert();
            }
        };

        let store = self.clone();
        let query = query.clone();
        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(store.inner.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous: Option<Vec<Document>> = None;
            loop {
                interval.tick().await;
                match store.run_query(&query).await {
                    Ok(results) => {
                        let first = previous.is_none();
                        let changes = diff_results(previous.as_deref().unwrap_or(&[]), &results);
                        previous = Some(results);
                        // The first batch is delivered even when empty.
                        if first || !changes.is_empty() {
                            handler(Ok(QuerySnapshot::new(changes)));
                        }
                    }
                    Err(err) => {
                        warn!("Polling query {} failed: {}", query, err);
                        handler(Err(err));
                    }
                }
            }
        });

        let abort = task.abort_handle();
        ListenerRegistration::new(move || abort.abort())
    }
}
