//! Record store API client.
//!
//! [`StoreClient`] is the single request primitive every component goes
//! through. Each method issues exactly one HTTP request and never retries;
//! pacing between the requests of a multi-request operation is the caller's
//! job via [`StoreClient::pace`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::error::{Result, StoreError};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::rate_limit::ApiRateLimiter;
use crate::types::{
    DEFAULT_API_URL, DEFAULT_REQUEST_DELAY_MS, Fields, ListQuery, MAX_BATCH_SIZE, NewRecord, Page,
    Record, RecordList, RecordPatch, TableRef,
};

/// Options for building a [`StoreClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API root, e.g. `https://api.airtable.com/v0`.
    pub api_url: String,
    /// Delay callers wait between requests of one logical operation.
    pub request_delay: Duration,
    /// Overall HTTP timeout. `None` never times out.
    pub timeout: Option<Duration>,
    /// Ask the store to coerce string values into field types on write.
    pub typecast: bool,
    /// Optional proactive limiter awaited before every request.
    pub rate_limiter: Option<ApiRateLimiter>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            timeout: None,
            typecast: false,
            rate_limiter: None,
        }
    }
}

/// Record store API client.
#[derive(Clone)]
pub struct StoreClient {
    transport: Arc<dyn HttpTransport>,
    api_url: Url,
    api_key: String,
    request_delay: Duration,
    typecast: bool,
    rate_limiter: Option<ApiRateLimiter>,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("api_url", &self.api_url.as_str())
            .field("request_delay", &self.request_delay)
            .field("typecast", &self.typecast)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

impl StoreClient {
    /// Create a client backed by reqwest.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tabsync::{ClientOptions, StoreClient};
    ///
    /// let client = StoreClient::new("key...", ClientOptions::default())?;
    /// ```
    pub fn new(api_key: &str, options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(options.timeout)
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Self::new_with_transport(api_key, options, Arc::new(transport))
    }

    pub fn new_with_transport(
        api_key: &str,
        options: ClientOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(StoreError::Config("API key is empty".to_string()));
        }

        let api_url = Url::parse(options.api_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Config(format!("invalid API URL {}: {e}", options.api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "API URL cannot be a base: {}",
                options.api_url
            )));
        }

        Ok(Self {
            transport,
            api_url,
            api_key: api_key.to_string(),
            request_delay: options.request_delay,
            typecast: options.typecast,
            rate_limiter: options.rate_limiter,
        })
    }

    /// Configured inter-request delay.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Wait the inter-request delay.
    ///
    /// Multi-request operations call this between consecutive requests.
    pub async fn pace(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// URL of a table endpoint, or of one record when `record_id` is given.
    pub fn table_url(&self, table: &TableRef, record_id: Option<&str>) -> Url {
        let mut url = self.api_url.clone();
        {
            // cannot_be_a_base was rejected in the constructor
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .push(&table.base_id)
                    .push(&table.table);
                if let Some(id) = record_id {
                    segments.push(id);
                }
            }
        }
        url
    }

    /// URL of a list request for one page.
    pub fn list_url(&self, table: &TableRef, query: &ListQuery, offset: Option<&str>) -> Url {
        let mut url = self.table_url(table, None);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(view) = &query.view {
                pairs.append_pair("view", view);
            }
            if let Some(formula) = &query.filter_by_formula {
                pairs.append_pair("filterByFormula", formula);
            }
            if let Some(page_size) = query.page_size {
                pairs.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(max_records) = query.max_records {
                pairs.append_pair("maxRecords", &max_records.to_string());
            }
            for field in &query.fields {
                pairs.append_pair("fields[]", field);
            }
            if let Some(offset) = offset {
                pairs.append_pair("offset", offset);
            }
        }
        // Drop a dangling `?` when no parameters were appended.
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    /// Fetch one page of a table.
    pub async fn list_page(
        &self,
        table: &TableRef,
        query: &ListQuery,
        offset: Option<&str>,
    ) -> Result<Page> {
        let url = self.list_url(table, query, offset);
        let response = self.send(HttpMethod::Get, url, None).await?;
        read_json(response)
    }

    /// Create one record.
    pub async fn create_record(&self, table: &TableRef, fields: &Fields) -> Result<Record> {
        let mut body = json!({ "fields": fields });
        if self.typecast {
            body["typecast"] = Value::Bool(true);
        }
        let url = self.table_url(table, None);
        let response = self.send(HttpMethod::Post, url, Some(body)).await?;
        read_json(response)
    }

    /// Create up to [`MAX_BATCH_SIZE`] records in one call.
    pub async fn create_records(
        &self,
        table: &TableRef,
        records: &[NewRecord],
    ) -> Result<Vec<Record>> {
        check_batch_size(records.len())?;

        let mut body = json!({ "records": records });
        if self.typecast {
            body["typecast"] = Value::Bool(true);
        }
        let url = self.table_url(table, None);
        let response = self.send(HttpMethod::Post, url, Some(body)).await?;
        let list: RecordList = read_json(response)?;
        Ok(list.records)
    }

    /// Patch one record by id.
    pub async fn update_record(
        &self,
        table: &TableRef,
        record_id: &str,
        fields: &Fields,
    ) -> Result<Record> {
        let mut body = json!({ "fields": fields });
        if self.typecast {
            body["typecast"] = Value::Bool(true);
        }
        let url = self.table_url(table, Some(record_id));
        let response = self.send(HttpMethod::Patch, url, Some(body)).await?;
        read_json(response)
    }

    /// Patch up to [`MAX_BATCH_SIZE`] records in one call.
    pub async fn update_records(
        &self,
        table: &TableRef,
        patches: &[RecordPatch],
    ) -> Result<Vec<Record>> {
        check_batch_size(patches.len())?;

        let mut body = json!({ "records": patches });
        if self.typecast {
            body["typecast"] = Value::Bool(true);
        }
        let url = self.table_url(table, None);
        let response = self.send(HttpMethod::Patch, url, Some(body)).await?;
        let list: RecordList = read_json(response)?;
        Ok(list.records)
    }

    /// Make one authenticated request.
    async fn send(&self, method: HttpMethod, url: Url, body: Option<Value>) -> Result<HttpResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), "tabsync".to_string()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ),
        ];
        let body = match body {
            Some(value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                serde_json::to_vec(&value)?
            }
            None => Vec::new(),
        };

        tracing::debug!(method = method.as_str(), url = %url, "store request");

        let request = HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        };

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(StoreError::Api {
                status: response.status,
                message: api_error_message(&response.body),
            });
        }

        Ok(response)
    }
}

fn check_batch_size(size: usize) -> Result<()> {
    if size > MAX_BATCH_SIZE {
        return Err(StoreError::BatchTooLarge {
            size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(StoreError::Json)
}

/// Extract a readable message from the store's error envelope.
///
/// The store answers `{"error": {"type": ..., "message": ...}}` or
/// `{"error": "TYPE"}`; anything else is returned verbatim.
fn api_error_message(body: &[u8]) -> String {
    let raw = || String::from_utf8_lossy(body).to_string();

    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return raw();
    };

    match value.get("error") {
        Some(Value::String(kind)) => kind.clone(),
        Some(Value::Object(err)) => {
            let kind = err.get("type").and_then(Value::as_str);
            let message = err.get("message").and_then(Value::as_str);
            match (kind, message) {
                (Some(kind), Some(message)) => format!("{kind}: {message}"),
                (Some(kind), None) => kind.to_string(),
                (None, Some(message)) => message.to_string(),
                (None, None) => raw(),
            }
        }
        _ => raw(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::http::MockTransport;
    use serde_json::Map;

    pub(crate) const API: &str = "https://api.test/v0";

    pub(crate) fn table() -> TableRef {
        TableRef::new("app1", "Voice Mails")
    }

    pub(crate) fn client(transport: &MockTransport) -> StoreClient {
        let options = ClientOptions {
            api_url: API.to_string(),
            ..ClientOptions::default()
        };
        StoreClient::new_with_transport("key123", options, Arc::new(transport.clone()))
            .expect("client should build")
    }

    pub(crate) fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub(crate) fn record_json(id: &str) -> Value {
        json!({
            "id": id,
            "createdTime": "2024-01-01T00:00:00.000Z",
            "fields": { "Name": id }
        })
    }

    pub(crate) fn records_json(ids: &[&str]) -> Value {
        Value::Array(ids.iter().map(|id| record_json(id)).collect())
    }

    pub(crate) fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_slice(&request.body).expect("request body should be JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::http::MockTransport;

    #[test]
    fn test_new_rejects_empty_key_and_bad_url() {
        let transport = MockTransport::new();

        let err = StoreClient::new_with_transport(
            " ",
            ClientOptions::default(),
            Arc::new(transport.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let options = ClientOptions {
            api_url: "not a url".to_string(),
            ..ClientOptions::default()
        };
        let err =
            StoreClient::new_with_transport("key", options, Arc::new(transport)).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_table_url_encodes_segments() {
        let transport = MockTransport::new();
        let client = client(&transport);

        assert_eq!(
            client.table_url(&table(), None).as_str(),
            "https://api.test/v0/app1/Voice%20Mails"
        );
        assert_eq!(
            client.table_url(&table(), Some("rec1")).as_str(),
            "https://api.test/v0/app1/Voice%20Mails/rec1"
        );
    }

    #[test]
    fn test_table_url_tolerates_trailing_slash() {
        let transport = MockTransport::new();
        let options = ClientOptions {
            api_url: "https://api.test/v0/".to_string(),
            ..ClientOptions::default()
        };
        let client =
            StoreClient::new_with_transport("key", options, Arc::new(transport)).unwrap();
        assert_eq!(
            client.table_url(&table(), None).as_str(),
            "https://api.test/v0/app1/Voice%20Mails"
        );
    }

    #[test]
    fn test_list_url_carries_query_and_offset() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let query = ListQuery::default()
            .with_formula("Processed = FALSE()")
            .with_page_size(50);
        let url = client.list_url(&table(), &query, Some("itr/rec9"));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("view".to_string(), "Grid view".to_string()),
                ("filterByFormula".to_string(), "Processed = FALSE()".to_string()),
                ("pageSize".to_string(), "50".to_string()),
                ("offset".to_string(), "itr/rec9".to_string()),
            ]
        );

        let bare = client.list_url(&table(), &ListQuery::all(), None);
        assert_eq!(bare.as_str(), "https://api.test/v0/app1/Voice%20Mails");
    }

    #[tokio::test]
    async fn test_list_page_sends_bearer_and_parses_page() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let url = client.list_url(&table(), &ListQuery::default(), None);

        transport.push_json(
            HttpMethod::Get,
            url.as_str(),
            200,
            json!({ "records": records_json(&["rec1", "rec2"]), "offset": "itr/2" }),
        );

        let page = client
            .list_page(&table(), &ListQuery::default(), None)
            .await
            .expect("page should parse");

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.offset.as_deref(), Some("itr/2"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("authorization"), Some("Bearer key123"));
        assert!(requests[0].body.is_empty());
        assert_eq!(requests[0].header("content-type"), None);
    }

    #[tokio::test]
    async fn test_api_error_envelope_is_parsed() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let url = client.table_url(&table(), Some("rec1"));

        transport.push_json(
            HttpMethod::Patch,
            url.as_str(),
            422,
            json!({"error": {"type": "INVALID_VALUE_FOR_COLUMN", "message": "bad value"}}),
        );
        transport.push_json(
            HttpMethod::Patch,
            url.as_str(),
            404,
            json!({"error": "NOT_FOUND"}),
        );

        let err = client
            .update_record(&table(), "rec1", &Fields::new())
            .await
            .unwrap_err();
        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "INVALID_VALUE_FOR_COLUMN: bad value");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = client
            .update_record(&table(), "rec1", &Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 404, ref message } if message == "NOT_FOUND"));
    }

    #[test]
    fn test_api_error_message_falls_back_to_raw_body() {
        assert_eq!(api_error_message(b"gateway timeout"), "gateway timeout");
        assert_eq!(api_error_message(br#"{"other": 1}"#), r#"{"other": 1}"#);
    }

    #[tokio::test]
    async fn test_create_records_rejects_oversize_batch_without_io() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let records = vec![NewRecord::default(); MAX_BATCH_SIZE + 1];

        let err = client.create_records(&table(), &records).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size: 11, max: 10 }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_record_posts_fields_with_typecast() {
        let transport = MockTransport::new();
        let options = ClientOptions {
            api_url: API.to_string(),
            typecast: true,
            ..ClientOptions::default()
        };
        let client =
            StoreClient::new_with_transport("key", options, Arc::new(transport.clone())).unwrap();
        let url = client.table_url(&table(), None);
        transport.push_json(HttpMethod::Post, url.as_str(), 200, record_json("recNew"));

        let record = client
            .create_record(&table(), &fields(json!({"Name": "Ada"})))
            .await
            .unwrap();
        assert_eq!(record.id, "recNew");

        let requests = transport.requests();
        assert_eq!(requests[0].header("content-type"), Some("application/json"));
        assert_eq!(
            body_json(&requests[0]),
            json!({"fields": {"Name": "Ada"}, "typecast": true})
        );
    }

    #[tokio::test]
    async fn test_update_records_sends_ids_and_fields() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let url = client.table_url(&table(), None);
        transport.push_json(
            HttpMethod::Patch,
            url.as_str(),
            200,
            json!({ "records": records_json(&["rec1"]) }),
        );

        let patches = vec![RecordPatch::new("rec1", fields(json!({"Processed": true})))];
        let updated = client.update_records(&table(), &patches).await.unwrap();
        assert_eq!(updated.len(), 1);

        let requests = transport.requests();
        assert_eq!(
            body_json(&requests[0]),
            json!({"records": [{"id": "rec1", "fields": {"Processed": true}}]})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_waits_configured_delay() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let start = tokio::time::Instant::now();
        client.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(DEFAULT_REQUEST_DELAY_MS));
    }
}
