//! Notion database query client and cursor pagination.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::NotionConfig;

/// One decoded page of a cursor-paginated list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Requests pages until the source stops handing out a cursor, keeping items in
/// arrival order. The cursor is `None` on the first call. Any page error aborts.
pub async fn drain_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;
        items.extend(page.results);

        match page.next_cursor {
            Some(next) if page.has_more && !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    debug!(pages, items = items.len(), "pagination drained");
    Ok(items)
}

#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "notion-version",
            reqwest::header::HeaderValue::from_str(config.notion_version.trim())
                .context("invalid notion version header")?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create notion api client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
        })
    }

    /// Drains `POST /v1/databases/{id}/query`, decoding every result as `T`.
    pub async fn query_database<T>(
        &self,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/v1/databases/{}/query", self.api_base, database_id);
        let url = url.as_str();
        drain_pages(move |cursor| self.query_page(url, database_id, filter, cursor)).await
    }

    async fn query_page<T>(
        &self,
        url: &str,
        database_id: &str,
        filter: Option<&Value>,
        cursor: Option<String>,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let body = query_body(filter, cursor.as_deref());
        debug!(database_id, cursor = cursor.as_deref(), "querying notion database");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("notion query for database {database_id} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "notion query for database {database_id} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }

        response
            .json::<Page<T>>()
            .await
            .with_context(|| {
                format!("failed to decode notion query page for database {database_id}")
            })
    }
}

fn query_body(filter: Option<&Value>, start_cursor: Option<&str>) -> Value {
    let mut body = json!({});
    if let Some(filter) = filter {
        body["filter"] = filter.clone();
    }
    if let Some(cursor) = start_cursor {
        body["start_cursor"] = Value::String(cursor.to_string());
    }
    body
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}
