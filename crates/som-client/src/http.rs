//! HTTP adapter over the store's REST API
//!
//! Wraps `reqwest` with auth, per-request timeout and bounded retries for
//! transient failures (transport errors, 429/502/503/504).

use crate::error::{is_retryable_status, StoreError, StoreResult};
use crate::retry::RetryPolicy;
use crate::store::DocumentStore;
use crate::types::{
    AliasAction, BulkItemError, BulkResponse, ClusterInfo, ComponentTemplateItem, DataStream,
    IndexInfo, IndexPrivileges, IndexTemplate, IndexTemplateItem, IngestPipeline, OpType, Query,
    SearchResponse, StoredDocument,
};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use som_config::ElasticsearchSettings;
use std::collections::BTreeSet;
use std::time::Duration;

/// Keep-alive for point-in-time scans
const PIT_KEEP_ALIVE: &str = "2m";

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic {
        username: String,
        password: Option<String>,
    },
    ApiKey(String),
}

#[derive(Debug)]
enum Body {
    Empty,
    Json(Value),
    NdJson(String),
}

/// Store client speaking HTTP
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    auth: Auth,
    retry: RetryPolicy,
    timeout_ms: u64,
}

impl HttpDocumentStore {
    /// Build client from connection settings
    ///
    /// # Errors
    /// - `StoreError::Transport` if no host is configured or the HTTP client
    ///   cannot be built
    pub fn from_settings(settings: &ElasticsearchSettings) -> StoreResult<Self> {
        let base_url = settings
            .hosts
            .first()
            .ok_or_else(|| StoreError::Transport("no hosts configured".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut builder = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(Duration::from_secs(10));
        if settings.dns_cache_ttl_secs > 0 {
            // recycle pooled connections so DNS changes are picked up
            builder = builder.pool_idle_timeout(Duration::from_secs(settings.dns_cache_ttl_secs));
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let auth = match (&settings.api_key, &settings.username) {
            (Some(key), _) => Auth::ApiKey(key.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: settings.password.clone(),
            },
            (None, None) => Auth::None,
        };

        Ok(Self {
            client,
            base_url,
            auth,
            retry: RetryPolicy::from_settings(settings),
            timeout_ms: settings.request_timeout_ms,
        })
    }

    /// Override retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL requests are sent to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, body: &Body) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        request = match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::ApiKey(key) => request.header("Authorization", format!("ApiKey {key}")),
        };
        match body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::NdJson(payload) => request
                .header("Content-Type", "application/x-ndjson")
                .body(payload.clone()),
        }
    }

    /// Send with retries; returns the decoded body (`Null` when empty)
    async fn execute(&self, method: Method, path: &str, body: Body, resource: &str) -> StoreResult<Value> {
        let mut attempt = 0;
        loop {
            let outcome = self.request(method.clone(), path, &body).send().await;
            let error = match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| StoreError::Transport(e.to_string()))?;
                    if (200..300).contains(&status) {
                        return decode_body(&text);
                    }
                    if !(is_retryable_status(status) && self.retry.allows(attempt)) {
                        return Err(map_status(status, text, resource));
                    }
                    StoreError::status(status, text)
                }
                Err(e) if e.is_timeout() => StoreError::Timeout {
                    after_ms: self.timeout_ms,
                },
                Err(e) => StoreError::Transport(e.to_string()),
            };

            if !(error.is_retryable() && self.retry.allows(attempt)) {
                return Err(error);
            }
            let delay = self.retry.backoff(attempt);
            tracing::debug!(
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying store request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn execute_as<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Body,
        resource: &str,
    ) -> StoreResult<T> {
        let value = self.execute(method, path, body, resource).await?;
        serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn open_point_in_time(&self, index: &str) -> StoreResult<String> {
        let value = self
            .execute(
                Method::POST,
                &format!("{index}/_pit?keep_alive={PIT_KEEP_ALIVE}"),
                Body::Empty,
                index,
            )
            .await?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("point-in-time response without id".to_string()))
    }

    async fn close_point_in_time(&self, pit_id: &str) {
        let result = self
            .execute(Method::DELETE, "_pit", Body::Json(json!({ "id": pit_id })), "_pit")
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to close point in time");
        }
    }

    async fn scan_with_pit(&self, pit_id: &str, batch_size: usize) -> StoreResult<Vec<StoredDocument>> {
        let mut documents = Vec::new();
        let mut search_after: Option<Value> = None;
        loop {
            let mut body = json!({
                "size": batch_size,
                "pit": { "id": pit_id, "keep_alive": PIT_KEEP_ALIVE },
                "sort": [{ "_shard_doc": "asc" }],
                "query": { "match_all": {} },
            });
            if let Some(after) = &search_after {
                body["search_after"] = after.clone();
            }

            let page: RawSearch = self
                .execute_as(Method::POST, "_search", Body::Json(body), "_search")
                .await?;
            let hits = page.hits.hits;
            if hits.is_empty() {
                return Ok(documents);
            }
            search_after = hits.last().and_then(|h| h.sort.clone());
            let page_len = hits.len();
            documents.extend(hits.into_iter().map(RawHit::into_document));
            if page_len < batch_size || search_after.is_none() {
                return Ok(documents);
            }
        }
    }
}

fn decode_body(text: &str) -> StoreResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| StoreError::Decode(e.to_string()))
}

fn map_status(status: u16, body: String, resource: &str) -> StoreError {
    match status {
        404 => StoreError::not_found(resource),
        409 => StoreError::conflict(resource),
        401 | 403 => StoreError::Forbidden { reason: body },
        400 if body.contains("resource_already_exists_exception") => StoreError::conflict(resource),
        _ => StoreError::status(status, body),
    }
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    hits: RawHits,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Object { value: u64 },
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    sort: Option<Value>,
}

impl RawHit {
    fn into_document(self) -> StoredDocument {
        StoredDocument::new(self.id, self.source)
    }
}

#[derive(Debug, Deserialize)]
struct RawIndex {
    #[serde(default)]
    aliases: serde_json::Map<String, Value>,
    #[serde(default)]
    mappings: Value,
    #[serde(default)]
    settings: Value,
}

fn bulk_payload(documents: &[StoredDocument]) -> StoreResult<String> {
    let mut payload = String::new();
    for document in documents {
        let action = json!({ "index": { "_id": document.id } });
        payload.push_str(&action.to_string());
        payload.push('\n');
        payload.push_str(
            &serde_json::to_string(&document.source).map_err(|e| StoreError::Decode(e.to_string()))?,
        );
        payload.push('\n');
    }
    Ok(payload)
}

fn bulk_errors(response: &Value) -> Vec<BulkItemError> {
    response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("index"))
                .filter_map(|result| {
                    let error = result.get("error")?;
                    Some(BulkItemError {
                        id: result.get("_id").and_then(Value::as_str).unwrap_or_default().to_string(),
                        reason: error
                            .get("reason")
                            .and_then(Value::as_str)
                            .map_or_else(|| error.to_string(), str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn info(&self) -> StoreResult<ClusterInfo> {
        let value = self.execute(Method::GET, "", Body::Empty, "cluster").await?;
        Ok(ClusterInfo {
            cluster_name: value
                .get("cluster_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            version: value
                .pointer("/version/number")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn get_index(&self, index: &str) -> StoreResult<IndexInfo> {
        let indices: std::collections::BTreeMap<String, RawIndex> =
            self.execute_as(Method::GET, index, Body::Empty, index).await?;
        let (name, raw) = indices
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(index))?;
        Ok(IndexInfo {
            name,
            aliases: raw.aliases.keys().cloned().collect::<BTreeSet<_>>(),
            mappings: raw.mappings,
            settings: raw.settings,
        })
    }

    async fn create_index(&self, index: &str, mappings: Value, settings: Value) -> StoreResult<()> {
        let body = json!({ "mappings": mappings, "settings": settings });
        self.execute(Method::PUT, index, Body::Json(body), index).await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        self.execute(Method::DELETE, index, Body::Empty, index).await?;
        Ok(())
    }

    async fn refresh(&self, index: &str) -> StoreResult<()> {
        self.execute(Method::POST, &format!("{index}/_refresh"), Body::Empty, index)
            .await?;
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> StoreResult<Vec<String>> {
        let value = self
            .execute(Method::GET, &format!("_alias/{alias}"), Body::Empty, alias)
            .await?;
        let indices: Vec<String> = value
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        if indices.is_empty() {
            return Err(StoreError::not_found(alias));
        }
        Ok(indices)
    }

    async fn update_aliases(&self, actions: Vec<AliasAction>) -> StoreResult<()> {
        let body = json!({ "actions": actions });
        self.execute(Method::POST, "_aliases", Body::Json(body), "_aliases")
            .await?;
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> StoreResult<StoredDocument> {
        let resource = format!("{index}/{id}");
        let hit: RawHit = self
            .execute_as(Method::GET, &format!("{index}/_doc/{id}"), Body::Empty, &resource)
            .await?;
        Ok(hit.into_document())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        source: Value,
        op_type: OpType,
    ) -> StoreResult<()> {
        let path = format!("{index}/_doc/{id}?op_type={}&refresh=wait_for", op_type.as_str());
        self.execute(Method::PUT, &path, Body::Json(source), &format!("{index}/{id}"))
            .await?;
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> StoreResult<()> {
        let path = format!("{index}/_doc/{id}?refresh=wait_for");
        self.execute(Method::DELETE, &path, Body::Empty, &format!("{index}/{id}"))
            .await?;
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: Vec<StoredDocument>,
    ) -> StoreResult<BulkResponse> {
        if documents.is_empty() {
            return Ok(BulkResponse::default());
        }
        let payload = bulk_payload(&documents)?;
        let response = self
            .execute(Method::POST, &format!("{index}/_bulk"), Body::NdJson(payload), index)
            .await?;
        Ok(BulkResponse {
            items: documents.len(),
            errors: bulk_errors(&response),
        })
    }

    async fn search(
        &self,
        index: &str,
        query: Query,
        from: usize,
        size: usize,
    ) -> StoreResult<SearchResponse> {
        let body = json!({
            "query": query.to_json(),
            "from": from,
            "size": size,
            "track_total_hits": true,
        });
        let raw: RawSearch = self
            .execute_as(Method::POST, &format!("{index}/_search"), Body::Json(body), index)
            .await?;
        let total = match raw.hits.total {
            Some(RawTotal::Object { value } | RawTotal::Number(value)) => value,
            None => raw.hits.hits.len() as u64,
        };
        Ok(SearchResponse {
            total,
            hits: raw.hits.hits.into_iter().map(RawHit::into_document).collect(),
        })
    }

    async fn scan_all(&self, index: &str, batch_size: usize) -> StoreResult<Vec<StoredDocument>> {
        let pit_id = self.open_point_in_time(index).await?;
        let result = self.scan_with_pit(&pit_id, batch_size.max(1)).await;
        self.close_point_in_time(&pit_id).await;
        result
    }

    async fn count(&self, index: &str) -> StoreResult<u64> {
        let value = self
            .execute(Method::GET, &format!("{index}/_count"), Body::Empty, index)
            .await?;
        value
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Decode("count response without count".to_string()))
    }

    async fn get_data_stream(&self, name: &str) -> StoreResult<Vec<DataStream>> {
        #[derive(Deserialize)]
        struct Response {
            data_streams: Vec<DataStream>,
        }
        let response: Response = self
            .execute_as(Method::GET, &format!("_data_stream/{name}"), Body::Empty, name)
            .await?;
        Ok(response.data_streams)
    }

    async fn create_data_stream(&self, name: &str) -> StoreResult<()> {
        self.execute(Method::PUT, &format!("_data_stream/{name}"), Body::Empty, name)
            .await?;
        Ok(())
    }

    async fn delete_data_stream(&self, name: &str) -> StoreResult<()> {
        self.execute(Method::DELETE, &format!("_data_stream/{name}"), Body::Empty, name)
            .await?;
        Ok(())
    }

    async fn get_index_templates(&self) -> StoreResult<Vec<IndexTemplateItem>> {
        #[derive(Deserialize)]
        struct Response {
            index_templates: Vec<IndexTemplateItem>,
        }
        let response: Response = self
            .execute_as(Method::GET, "_index_template", Body::Empty, "_index_template")
            .await?;
        Ok(response.index_templates)
    }

    async fn get_index_template(&self, name: &str) -> StoreResult<Vec<IndexTemplateItem>> {
        #[derive(Deserialize)]
        struct Response {
            index_templates: Vec<IndexTemplateItem>,
        }
        let response: Response = self
            .execute_as(Method::GET, &format!("_index_template/{name}"), Body::Empty, name)
            .await?;
        Ok(response.index_templates)
    }

    async fn put_index_template(&self, name: &str, template: IndexTemplate) -> StoreResult<()> {
        let body = serde_json::to_value(&template).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.execute(Method::PUT, &format!("_index_template/{name}"), Body::Json(body), name)
            .await?;
        Ok(())
    }

    async fn delete_index_template(&self, name: &str) -> StoreResult<()> {
        self.execute(Method::DELETE, &format!("_index_template/{name}"), Body::Empty, name)
            .await?;
        Ok(())
    }

    async fn get_component_templates(&self, name: &str) -> StoreResult<Vec<ComponentTemplateItem>> {
        #[derive(Deserialize)]
        struct Response {
            component_templates: Vec<ComponentTemplateItem>,
        }
        let response: Response = self
            .execute_as(Method::GET, &format!("_component_template/{name}"), Body::Empty, name)
            .await?;
        Ok(response.component_templates)
    }

    async fn put_component_template(&self, name: &str, template: Value) -> StoreResult<()> {
        self.execute(
            Method::PUT,
            &format!("_component_template/{name}"),
            Body::Json(template),
            name,
        )
        .await?;
        Ok(())
    }

    async fn delete_component_template(&self, name: &str) -> StoreResult<()> {
        self.execute(Method::DELETE, &format!("_component_template/{name}"), Body::Empty, name)
            .await?;
        Ok(())
    }

    async fn get_pipeline(&self, id: &str) -> StoreResult<IngestPipeline> {
        let mut pipelines: std::collections::BTreeMap<String, IngestPipeline> = self
            .execute_as(Method::GET, &format!("_ingest/pipeline/{id}"), Body::Empty, id)
            .await?;
        pipelines.remove(id).ok_or_else(|| StoreError::not_found(id))
    }

    async fn put_pipeline(&self, id: &str, pipeline: IngestPipeline) -> StoreResult<()> {
        let body = serde_json::to_value(&pipeline).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.execute(Method::PUT, &format!("_ingest/pipeline/{id}"), Body::Json(body), id)
            .await?;
        Ok(())
    }

    async fn delete_pipeline(&self, id: &str) -> StoreResult<()> {
        self.execute(Method::DELETE, &format!("_ingest/pipeline/{id}"), Body::Empty, id)
            .await?;
        Ok(())
    }

    async fn has_privileges(
        &self,
        names: &[String],
        privileges: &[String],
    ) -> StoreResult<IndexPrivileges> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            index: IndexPrivileges,
        }
        let body = json!({ "index": [{ "names": names, "privileges": privileges }] });
        let response: Response = self
            .execute_as(
                Method::POST,
                "_security/user/_has_privileges",
                Body::Json(body),
                "_has_privileges",
            )
            .await?;
        Ok(response.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> ElasticsearchSettings {
        ElasticsearchSettings {
            hosts: vec!["http://es.local:9200/".to_string()],
            ..ElasticsearchSettings::default()
        }
    }

    #[test]
    fn base_url_trims_trailing_slash() {
        let store = HttpDocumentStore::from_settings(&settings()).unwrap();
        assert_eq!(store.base_url(), "http://es.local:9200");
        assert_eq!(store.url("/_aliases"), "http://es.local:9200/_aliases");
    }

    #[test]
    fn no_hosts_is_an_error() {
        let settings = ElasticsearchSettings {
            hosts: vec![],
            ..ElasticsearchSettings::default()
        };
        assert!(matches!(
            HttpDocumentStore::from_settings(&settings),
            Err(StoreError::Transport(_))
        ));
    }

    #[test]
    fn api_key_takes_precedence() {
        let settings = ElasticsearchSettings {
            api_key: Some("abc".into()),
            username: Some("elastic".into()),
            ..settings()
        };
        let store = HttpDocumentStore::from_settings(&settings).unwrap();
        assert!(matches!(store.auth, Auth::ApiKey(ref k) if k == "abc"));
    }

    #[test]
    fn status_mapping() {
        assert!(map_status(404, String::new(), "x").is_not_found());
        assert!(map_status(409, String::new(), "x").is_conflict());
        assert!(map_status(400, "resource_already_exists_exception".into(), "x").is_conflict());
        assert!(matches!(map_status(403, "no".into(), "x"), StoreError::Forbidden { .. }));
        assert_eq!(map_status(500, "boom".into(), "x").status_code(), Some(500));
    }

    #[test]
    fn bulk_payload_is_ndjson() {
        let payload = bulk_payload(&[
            StoredDocument::new("a", json!({"type": "t"})),
            StoredDocument::new("b", json!({"type": "u"})),
        ])
        .unwrap();
        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"index":{"_id":"a"}}"#);
        assert_eq!(lines[3], r#"{"type":"u"}"#);
        assert!(payload.ends_with('\n'));
    }

    #[test]
    fn bulk_errors_are_collected() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 400, "error": {"reason": "mapper_parsing_exception"}}}
            ]
        });
        assert_eq!(
            bulk_errors(&response),
            vec![BulkItemError {
                id: "b".into(),
                reason: "mapper_parsing_exception".into()
            }]
        );
    }

    #[test]
    fn empty_body_decodes_to_null() {
        assert_eq!(decode_body("  ").unwrap(), Value::Null);
        assert!(matches!(decode_body("{"), Err(StoreError::Decode(_))));
    }
}
