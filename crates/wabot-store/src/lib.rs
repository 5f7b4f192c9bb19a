//! wabot-store: path-keyed persistence against the hosted realtime database.
//!
//! Every node is addressed by a slash-separated path and read or written as
//! JSON through the database's REST surface (`<base>/<path>.json`). Task
//! records live under `tugas/<id>`.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use wabot_types::Task;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database returned {status} for {path}: {body}")]
    Status {
        status: StatusCode,
        path: String,
        body: String,
    },
    #[error("database value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// REST client for the hierarchical database.
pub struct Db {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl Db {
    /// Create a client for the database at `base_url`, with an optional
    /// auth secret appended to every request.
    pub fn new(base_url: &str, auth: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn node_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        match &self.auth {
            Some(secret) => format!("{}/{path}.json?auth={secret}", self.base_url),
            None => format!("{}/{path}.json", self.base_url),
        }
    }

    async fn check(
        &self,
        path: &str,
        resp: reqwest::Result<reqwest::Response>,
    ) -> Result<reqwest::Response> {
        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                error!(path, "database request failed: {e}");
                return Err(e.into());
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(path, %status, "database rejected request: {body}");
            return Err(StoreError::Status {
                status,
                path: path.to_string(),
                body,
            });
        }
        Ok(resp)
    }

    /// Read the JSON value at `path`. Absent nodes come back as `Value::Null`.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .check(path, self.client.get(self.node_url(path)).send().await)
            .await?;
        let value = resp.json().await.map_err(|e| {
            error!(path, "database read could not be decoded: {e}");
            StoreError::from(e)
        })?;
        Ok(value)
    }

    /// Replace the value at `path`.
    pub async fn set<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        self.check(
            path,
            self.client.put(self.node_url(path)).json(value).send().await,
        )
        .await?;
        info!(path, "data saved");
        Ok(())
    }

    /// Merge `value`'s top-level keys into the node at `path`.
    pub async fn update<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        self.check(
            path,
            self.client
                .patch(self.node_url(path))
                .json(value)
                .send()
                .await,
        )
        .await?;
        info!(path, "data updated");
        Ok(())
    }

    /// Remove the node at `path`.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.check(path, self.client.delete(self.node_url(path)).send().await)
            .await?;
        info!(path, "data deleted");
        Ok(())
    }
}

/// Task CRUD seam used by the command router and the daily sweep.
#[async_trait::async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a task under a fresh time-derived id and return that id.
    async fn add_task(
        &self,
        dosen: &str,
        nama_tugas: &str,
        deadline: &str,
        session_id: &str,
    ) -> Result<String>;

    /// The full `tugas` subtree, id → record. Empty when nothing is stored.
    async fn all_tasks(&self) -> Result<BTreeMap<String, Task>>;

    /// Remove the task stored under `id`.
    async fn delete_task(&self, id: &str) -> Result<()>;
}

/// Production [`TaskRepository`] backed by the hosted database.
pub struct RtdbTaskStore {
    db: Db,
}

impl RtdbTaskStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Millisecond-timestamp id. Two tasks created in the same instant can
    /// collide; accepted risk.
    fn next_id() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait::async_trait]
impl TaskRepository for RtdbTaskStore {
    async fn add_task(
        &self,
        dosen: &str,
        nama_tugas: &str,
        deadline: &str,
        session_id: &str,
    ) -> Result<String> {
        let id = Self::next_id();
        let task = Task {
            dosen: dosen.to_string(),
            nama_tugas: nama_tugas.to_string(),
            deadline: deadline.to_string(),
            session_id: session_id.to_string(),
        };
        self.db.set(&format!("tugas/{id}"), &task).await?;
        Ok(id)
    }

    async fn all_tasks(&self) -> Result<BTreeMap<String, Task>> {
        let value = self.db.get("tugas").await?;
        if value.is_null() {
            return Ok(BTreeMap::new());
        }
        let tasks = serde_json::from_value(value).map_err(|e| {
            error!("task subtree could not be decoded: {e}");
            StoreError::from(e)
        })?;
        Ok(tasks)
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        self.db.delete(&format!("tugas/{id}")).await
    }
}
