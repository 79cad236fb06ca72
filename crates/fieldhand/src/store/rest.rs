// ABOUTME: Record store backed by a PostgREST-style HTTP API.
// ABOUTME: Duplicate check is a filtered GET on phone; insert is a POST asking for the created row back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{CustomerRecord, RecordId, RecordStore};
use crate::error::StoreError;

/// Table records are written to unless configured otherwise.
pub const DEFAULT_TABLE: &str = "customers";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl RestStore {
    /// Creates a store for `base_url` (the project root, without `/rest/v1`).
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build http client: {}", e)))?;
        Self::with_client(client, base_url, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| StoreError::Config(format!("invalid store url {:?}: {}", base_url, e)))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(StoreError::Config(format!(
                "store url must be http or https: {}",
                base_url
            )));
        }
        let mut store = Self {
            client,
            endpoint: base,
            api_key: api_key.into(),
        };
        store.set_table(DEFAULT_TABLE)?;
        Ok(store)
    }

    /// Writes to `table` instead of [`DEFAULT_TABLE`].
    pub fn table(mut self, table: &str) -> Result<Self, StoreError> {
        self.set_table(table)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn set_table(&mut self, table: &str) -> Result<(), StoreError> {
        let root = self.endpoint.as_str().split("/rest/v1/").next().unwrap_or_default();
        let joined = format!("{}/rest/v1/{}", root.trim_end_matches('/'), table);
        self.endpoint = Url::parse(&joined)
            .map_err(|e| StoreError::Config(format!("invalid table {:?}: {}", table, e)))?;
        Ok(())
    }

    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| StoreError::Config("api key is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| StoreError::Config("api key is not a valid header value".to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

async fn read_success(response: reqwest::Response) -> Result<Value, StoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Pulls the id out of a `return=representation` body, which is usually a
/// one-element array.
fn record_id(body: &Value) -> RecordId {
    let row = match body {
        Value::Array(rows) => rows.first(),
        other => Some(other),
    };
    match row.and_then(|r| r.get("id")) {
        Some(Value::String(id)) => RecordId(id.clone()),
        Some(Value::Null) | None => RecordId::default(),
        Some(other) => RecordId(other.to_string()),
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn check_duplicate(&self, phone: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .headers(self.auth_headers()?)
            .query(&[("select", "id".to_string()), ("phone", format!("eq.{}", phone))])
            .send()
            .await?;
        let body = read_success(response).await?;
        let duplicate = matches!(&body, Value::Array(rows) if !rows.is_empty());
        debug!(%phone, duplicate, "duplicate check");
        Ok(duplicate)
    }

    async fn insert(&self, record: &CustomerRecord) -> Result<RecordId, StoreError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.auth_headers()?)
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await?;
        let body = read_success(response).await?;
        let id = record_id(&body);
        debug!(%id, phone = %record.phone, "record inserted");
        Ok(id)
    }
}
