//! Inventory service HTTP adapter
//!
//! JSON over HTTP against the inventory service. Every response carries the
//! envelope `{result, bk_error_code, bk_error_msg, data}`.

use async_trait::async_trait;
use cloudsync_core::{
    CloudHost, CloudSyncTask, ConfirmationFilter, ConfirmationRequest, HostFilter, HostId,
    InventoryService, SyncHistory, TaskFilter, TaskId, TaskSummary,
};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Tenant header
pub const SUPPLIER_ACCOUNT_HEADER: &str = "HTTP_BLUEKING_SUPPLIER_ACCOUNT";
/// Operator header
pub const USER_HEADER: &str = "BK_User";

/// Import source tag for hosts created by cloud sync
const IMPORT_FROM_CLOUD_SYNC: &str = "3";
/// Cloud area of created hosts
const DEFAULT_CLOUD_ID: i64 = 1;

type CoreResult<T> = cloudsync_core::Result<T>;

#[derive(Debug, Deserialize)]
struct Envelope {
    result: bool,
    #[serde(default)]
    bk_error_code: i64,
    #[serde(default)]
    bk_error_msg: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    count: usize,
    #[serde(default = "Vec::new")]
    info: Vec<T>,
}

/// Unwrap the response envelope
fn decode_envelope(body: &str) -> CoreResult<Value> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| cloudsync_core::Error::Inventory(format!("malformed response: {}", e)))?;
    if !envelope.result {
        return Err(cloudsync_core::Error::Inventory(format!(
            "{} ({})",
            envelope.bk_error_msg, envelope.bk_error_code
        )));
    }
    Ok(envelope.data)
}

fn decode_page<T: DeserializeOwned>(data: Value) -> CoreResult<Vec<T>> {
    let page: Page<T> = serde_json::from_value(data)?;
    debug!(count = page.count, returned = page.info.len(), "Inventory page decoded");
    Ok(page.info)
}

/// Number of tasks already using a name, integer or float on the wire
fn duplicate_count(data: &Value) -> CoreResult<f64> {
    data.as_f64().ok_or(cloudsync_core::Error::FieldCoercion {
        field: "data",
        expected: "number",
    })
}

/// Payload for a batch host creation
fn host_creation_body(owner_id: &str, hosts: &[CloudHost]) -> CoreResult<Value> {
    let mut host_info = Map::new();
    for (index, host) in hosts.iter().enumerate() {
        let mut record = serde_json::to_value(host)?;
        record["import_from"] = json!(IMPORT_FROM_CLOUD_SYNC);
        record["bk_cloud_id"] = json!(DEFAULT_CLOUD_ID);
        host_info.insert(index.to_string(), record);
    }
    Ok(json!({
        "bk_supplier_account": owner_id,
        "host_info": host_info,
    }))
}

#[derive(Serialize)]
struct SummaryUpdate<'a> {
    #[serde(rename = "bk_task_id")]
    task_id: TaskId,
    #[serde(flatten)]
    summary: &'a TaskSummary,
}

/// Inventory service reached over HTTP
pub struct HttpInventory {
    client: Client,
    base_url: String,
    owner_id: String,
    user: String,
}

impl HttpInventory {
    /// Create an adapter
    pub fn new(
        base_url: impl Into<String>,
        owner_id: impl Into<String>,
        user: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            owner_id: owner_id.into(),
            user: user.into(),
        })
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> CoreResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .request(method, &url)
            .header(SUPPLIER_ACCOUNT_HEADER, &self.owner_id)
            .header(USER_HEADER, &self.user)
            .json(body)
            .send()
            .await
            .map_err(|e| cloudsync_core::Error::Inventory(format!("{}: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| cloudsync_core::Error::Inventory(format!("{}: {}", path, e)))?;
        debug!(path, status = status.as_u16(), "Inventory response");
        decode_envelope(&text)
    }
}

#[async_trait]
impl InventoryService for HttpInventory {
    async fn check_task_name_unique(&self, name: &str) -> CoreResult<bool> {
        let data = self
            .request(Method::POST, "/cloud/check", &json!({ "bk_task_name": name }))
            .await?;
        Ok(duplicate_count(&data)? == 0.0)
    }

    async fn create_task(&self, task: &CloudSyncTask) -> CoreResult<TaskId> {
        let data = self.request(Method::POST, "/cloud/add", task).await?;
        data.get("bk_task_id")
            .or_else(|| data.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| cloudsync_core::Error::Inventory("created task has no id".to_string()))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> CoreResult<Vec<CloudSyncTask>> {
        let data = self.request(Method::POST, "/cloud/search", filter).await?;
        decode_page(data)
    }

    async fn update_task_summary(&self, task_id: TaskId, summary: &TaskSummary) -> CoreResult<()> {
        self.request(
            Method::PUT,
            "/cloud/update",
            &SummaryUpdate { task_id, summary },
        )
        .await?;
        Ok(())
    }

    async fn append_history(&self, entry: &SyncHistory) -> CoreResult<()> {
        self.request(Method::POST, "/cloud/sync/history/add", entry)
            .await?;
        Ok(())
    }

    async fn list_hosts(&self, filter: &HostFilter) -> CoreResult<Vec<Value>> {
        let data = self.request(Method::POST, "/hosts/search", filter).await?;
        decode_page(data)
    }

    async fn create_hosts(&self, hosts: &[CloudHost]) -> CoreResult<()> {
        let body = host_creation_body(&self.owner_id, hosts)?;
        self.request(Method::POST, "/hosts/add", &body).await?;
        Ok(())
    }

    async fn update_host(&self, host_id: HostId, host: &CloudHost) -> CoreResult<()> {
        let mut body = serde_json::to_value(host)?;
        body["bk_host_id"] = json!(host_id.to_string());
        self.request(Method::PUT, "/hosts/batch", &body).await?;
        Ok(())
    }

    async fn list_pending_confirmations(
        &self,
        filter: &ConfirmationFilter,
    ) -> CoreResult<Vec<ConfirmationRequest>> {
        let data = self
            .request(Method::POST, "/cloud/confirm/search", filter)
            .await?;
        decode_page(data)
    }

    async fn submit_confirmation(&self, request: &ConfirmationRequest) -> CoreResult<()> {
        self.request(Method::POST, "/cloud/confirm/add", request)
            .await?;
        Ok(())
    }
}
