//! Host records exchanged with the inventory service
//!
//! Attribute keys are the inventory service's join keys and must stay
//! verbatim. Matching between cloud and inventory is by inner IP only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::task::{CloudSyncTask, TaskId};

/// Host identifier assigned by the inventory service
pub type HostId = i64;

/// Inner (private) IP attribute key
pub const BK_HOST_INNERIP: &str = "bk_host_innerip";
/// Outer (public) IP attribute key
pub const BK_HOST_OUTERIP: &str = "bk_host_outerip";
/// OS name attribute key
pub const BK_OS_NAME: &str = "bk_os_name";
/// Host id attribute key
pub const BK_HOST_ID: &str = "bk_host_id";
/// Cloud region attribute key
pub const BK_CLOUD_REGION: &str = "bk_cloud_region";

/// Source tag written on every confirmation request
pub const SOURCE_TYPE_CLOUD_SYNC: &str = "cloud_sync";

/// A host as reported by the cloud provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHost {
    /// Private address, the join key
    #[serde(rename = "bk_host_innerip")]
    pub inner_ip: String,
    /// Public address, empty when the instance has none
    #[serde(rename = "bk_host_outerip", default)]
    pub outer_ip: String,
    /// Operating system name
    #[serde(rename = "bk_os_name", default)]
    pub os_name: String,
    /// Cloud region the instance lives in
    #[serde(rename = "bk_cloud_region", default)]
    pub region: String,
}

impl CloudHost {
    /// Create a host descriptor
    pub fn new(
        inner_ip: impl Into<String>,
        outer_ip: impl Into<String>,
        os_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            inner_ip: inner_ip.into(),
            outer_ip: outer_ip.into(),
            os_name: os_name.into(),
            region: region.into(),
        }
    }
}

/// A host already present in the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Inventory host id
    pub host_id: HostId,
    /// Private address, the join key
    pub inner_ip: String,
    /// Public address
    pub outer_ip: String,
    /// Operating system name
    pub os_name: String,
}

impl HostRecord {
    /// Coerce a raw inventory record into a typed host.
    ///
    /// Search results may wrap the host attributes under a `host` key.
    pub fn from_attributes(raw: &Value) -> Result<Self> {
        let attrs = match raw.get("host") {
            Some(inner) if inner.is_object() => inner,
            _ => raw,
        };
        if !attrs.is_object() {
            return Err(Error::FieldCoercion {
                field: "host",
                expected: "object",
            });
        }

        Ok(Self {
            host_id: id_field(attrs, BK_HOST_ID)?,
            inner_ip: required_string(attrs, BK_HOST_INNERIP)?,
            outer_ip: optional_string(attrs, BK_HOST_OUTERIP)?,
            os_name: optional_string(attrs, BK_OS_NAME)?,
        })
    }

    /// Whether the cloud view differs in a tracked attribute
    pub fn differs_from(&self, cloud: &CloudHost) -> bool {
        self.os_name != cloud.os_name || self.outer_ip != cloud.outer_ip
    }
}

fn required_string(attrs: &Value, field: &'static str) -> Result<String> {
    match attrs.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::FieldCoercion {
            field,
            expected: "string",
        }),
    }
}

fn optional_string(attrs: &Value, field: &'static str) -> Result<String> {
    match attrs.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::FieldCoercion {
            field,
            expected: "string",
        }),
    }
}

fn id_field(attrs: &Value, field: &'static str) -> Result<i64> {
    let coerce = || Error::FieldCoercion {
        field,
        expected: "integer",
    };
    match attrs.get(field) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(coerce),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| coerce()),
        _ => Err(coerce()),
    }
}

/// A cloud host whose attributes drifted from the inventory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedHost {
    /// Id of the matching inventory record
    pub host_id: HostId,
    /// Fresh attributes from the cloud
    pub host: CloudHost,
}

/// Filter for `ListHosts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFilter {
    /// Target object type
    #[serde(rename = "bk_obj_id")]
    pub obj_id: String,
}

impl HostFilter {
    /// Hosts of the task's target object type
    pub fn for_task(task: &CloudSyncTask) -> Self {
        Self {
            obj_id: task.obj_id.clone(),
        }
    }
}

/// Kind of pending change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A newly discovered host
    NewAdd,
    /// An attribute change on a known host
    Change,
}

/// A change waiting for operator approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// Target object type
    #[serde(rename = "bk_obj_id")]
    pub obj_id: String,
    /// Private address
    #[serde(rename = "bk_host_innerip")]
    pub inner_ip: String,
    /// Public address
    #[serde(rename = "bk_host_outerip", default)]
    pub outer_ip: String,
    /// Operating system name
    #[serde(rename = "bk_os_name", default)]
    pub os_name: String,
    /// Origin of the request
    #[serde(rename = "bk_source_type", default)]
    pub source_type: String,
    /// Task that discovered the change
    #[serde(rename = "bk_task_id")]
    pub task_id: TaskId,
    /// Task name
    #[serde(rename = "bk_task_name", default)]
    pub task_name: String,
    /// Cloud account type
    #[serde(rename = "bk_account_type", default)]
    pub account_type: String,
    /// Cloud account administrator
    #[serde(rename = "bk_account_admin", default)]
    pub account_admin: String,
    /// Raised by the new-host policy
    #[serde(rename = "bk_confirm", default)]
    pub confirm: bool,
    /// Raised by the attribute-change policy
    #[serde(rename = "bk_attr_confirm", default)]
    pub attr_confirm: bool,
    /// Kind of change
    #[serde(rename = "bk_resource_type")]
    pub resource_type: ResourceType,
}

impl ConfirmationRequest {
    /// A `new_add` request for a host absent from the inventory
    pub fn new_host(task: &CloudSyncTask, host: &CloudHost) -> Self {
        Self::build(task, host, ResourceType::NewAdd)
    }

    /// A `change` request for a host whose attributes drifted
    pub fn changed_host(task: &CloudSyncTask, host: &CloudHost) -> Self {
        Self::build(task, host, ResourceType::Change)
    }

    fn build(task: &CloudSyncTask, host: &CloudHost, resource_type: ResourceType) -> Self {
        Self {
            obj_id: task.obj_id.clone(),
            inner_ip: host.inner_ip.clone(),
            outer_ip: host.outer_ip.clone(),
            os_name: host.os_name.clone(),
            source_type: SOURCE_TYPE_CLOUD_SYNC.to_string(),
            task_id: task.task_id,
            task_name: task.name.clone(),
            account_type: task.account_type.clone(),
            account_admin: task.account_admin.clone(),
            confirm: resource_type == ResourceType::NewAdd,
            attr_confirm: resource_type == ResourceType::Change,
            resource_type,
        }
    }
}

/// Filter for `ListPendingConfirmations`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationFilter {
    /// Match a kind of change
    #[serde(rename = "bk_resource_type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    /// Match the originating task
    #[serde(rename = "bk_task_id", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl ConfirmationFilter {
    /// Whether a request matches this filter
    pub fn matches(&self, request: &ConfirmationRequest) -> bool {
        self.resource_type.map_or(true, |t| t == request.resource_type)
            && self.task_id.map_or(true, |id| id == request.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::CloudCredential;
    use crate::trigger::Period;
    use serde_json::json;

    #[test]
    fn test_record_from_flat_attributes() {
        let record = HostRecord::from_attributes(&json!({
            "bk_host_id": 12,
            "bk_host_innerip": "10.0.0.1",
            "bk_host_outerip": "1.1.1.1",
            "bk_os_name": "linux",
        }))
        .unwrap();

        assert_eq!(record.host_id, 12);
        assert_eq!(record.inner_ip, "10.0.0.1");
        assert_eq!(record.outer_ip, "1.1.1.1");
        assert_eq!(record.os_name, "linux");
    }

    #[test]
    fn test_record_from_wrapped_search_result() {
        let record = HostRecord::from_attributes(&json!({
            "host": { "bk_host_id": "7", "bk_host_innerip": "10.0.0.2" },
            "biz": [],
        }))
        .unwrap();

        assert_eq!(record.host_id, 7);
        assert_eq!(record.outer_ip, "");
        assert_eq!(record.os_name, "");
    }

    #[test]
    fn test_record_coercion_errors() {
        let err = HostRecord::from_attributes(&json!({
            "bk_host_id": 1,
            "bk_host_innerip": 10,
        }))
        .unwrap_err();
        assert!(matches!(err, Error::FieldCoercion { field: BK_HOST_INNERIP, .. }));

        let err = HostRecord::from_attributes(&json!({
            "bk_host_id": "abc",
            "bk_host_innerip": "10.0.0.1",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::FieldCoercion { field: BK_HOST_ID, .. }));

        let err = HostRecord::from_attributes(&json!({
            "bk_host_id": 1,
            "bk_host_innerip": "10.0.0.1",
            "bk_os_name": ["linux"],
        }))
        .unwrap_err();
        assert!(matches!(err, Error::FieldCoercion { field: BK_OS_NAME, .. }));

        assert!(HostRecord::from_attributes(&json!("10.0.0.1")).is_err());
    }

    #[test]
    fn test_confirmation_payload_keys() {
        let task = CloudSyncTask::new("t", Period::EveryFiveMinutes, CloudCredential::default())
            .with_admin("alice");
        let host = CloudHost::new("10.0.0.3", "3.3.3.3", "centos", "ap-guangzhou");

        let json = serde_json::to_value(ConfirmationRequest::new_host(&task, &host)).unwrap();
        assert_eq!(json["bk_resource_type"], "new_add");
        assert_eq!(json["bk_confirm"], true);
        assert_eq!(json["bk_attr_confirm"], false);
        assert_eq!(json["bk_host_innerip"], "10.0.0.3");
        assert_eq!(json["bk_source_type"], "cloud_sync");
        assert_eq!(json["bk_account_admin"], "alice");

        let json = serde_json::to_value(ConfirmationRequest::changed_host(&task, &host)).unwrap();
        assert_eq!(json["bk_resource_type"], "change");
        assert_eq!(json["bk_attr_confirm"], true);
    }
}
