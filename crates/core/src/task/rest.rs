//! REST task collection
//!
//! Talks to a PostgREST-style endpoint where every row carries a `user_id`
//! column and filters are expressed as `column=eq.value` query parameters.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use super::model::{NewTask, Task, TaskPatch};
use super::repository::RemoteTaskCollection;
use crate::config::RemoteConfig;
use crate::error::Error;
use crate::Result;

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    task: &'a NewTask,
}

/// Remote collection reached over HTTP
pub struct RestTaskCollection {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RestTaskCollection {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn owner_filter(&self, owner_id: &str) -> String {
        format!(
            "{}?user_id=eq.{}",
            self.collection_url(),
            urlencoding::encode(owner_id)
        )
    }

    fn list_url(&self, owner_id: &str) -> String {
        format!("{}&select=*&order=created_at.desc", self.owner_filter(owner_id))
    }

    fn record_url(&self, id: &str, owner_id: &str) -> String {
        format!("{}&id=eq.{}", self.owner_filter(owner_id), urlencoding::encode(id))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.config.api_key {
            headers.insert("apikey", header_value(key)?);
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        }
        Ok(headers)
    }

    async fn check(resp: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::BackingStore(format!(
            "Failed to {}: HTTP {} {}",
            action, status, body
        )))
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| Error::Config(format!("Invalid header value: {}", e)))
}

#[async_trait]
impl RemoteTaskCollection for RestTaskCollection {
    async fn list(&self, owner_id: &str) -> Result<Vec<Task>> {
        let url = self.list_url(owner_id);
        debug!("Listing remote tasks: {}", url);

        let resp = self
            .client
            .get(url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to list tasks: {}", e)))?;

        Self::check(resp, "list tasks")
            .await?
            .json()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to parse task list: {}", e)))
    }

    async fn insert(&self, owner_id: &str, task: &NewTask) -> Result<Task> {
        let row = InsertRow {
            user_id: owner_id,
            task,
        };

        let resp = self
            .client
            .post(self.collection_url())
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to insert task: {}", e)))?;

        let mut rows: Vec<Task> = Self::check(resp, "insert task")
            .await?
            .json()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to parse inserted task: {}", e)))?;

        if rows.is_empty() {
            return Err(Error::BackingStore(
                "Insert returned no representation".into(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, id: &str, owner_id: &str, patch: &TaskPatch) -> Result<()> {
        let resp = self
            .client
            .patch(self.record_url(id, owner_id))
            .headers(self.headers()?)
            .json(patch)
            .send()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to update task: {}", e)))?;

        Self::check(resp, "update task").await?;
        Ok(())
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.record_url(id, owner_id))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| Error::BackingStore(format!("Failed to delete task: {}", e)))?;

        Self::check(resp, "delete task").await?;
        Ok(())
    }
}
