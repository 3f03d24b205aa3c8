//! Cloud sync task definitions
//!
//! Tasks are owned by the inventory service; the engine only reads them.
//! Field names follow the inventory service's attribute keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;
use crate::trigger::Period;

/// Task identifier assigned by the inventory service
pub type TaskId = i64;

/// Default target object type for synchronized hosts
pub const DEFAULT_OBJ_ID: &str = "host";

/// A secret value that never shows up in logs.
///
/// The backing memory is wiped on drop.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Credentials used to list a cloud account's inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudCredential {
    /// API secret id
    #[serde(rename = "bk_secret_id", default)]
    pub secret_id: String,
    /// API secret key
    #[serde(rename = "bk_secret_key", default)]
    pub secret_key: SecretString,
}

impl CloudCredential {
    /// Create a credential pair
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: SecretString::new(secret_key),
        }
    }
}

/// A named, scheduled cloud inventory synchronization job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSyncTask {
    /// Task id (0 until created)
    #[serde(rename = "bk_task_id", default)]
    pub task_id: TaskId,
    /// Unique task name
    #[serde(rename = "bk_task_name")]
    pub name: String,
    /// Owning tenant
    #[serde(rename = "bk_supplier_account", default)]
    pub owner_id: String,
    /// Raw period type (`day`, `hour`, `minute`)
    #[serde(rename = "bk_period_type")]
    pub period_type: String,
    /// Raw period value (`HH:MM` for `day`, minute offset for `hour`)
    #[serde(rename = "bk_period", default)]
    pub period: String,
    /// Whether the task should be scheduled
    #[serde(rename = "bk_status", default)]
    pub enabled: bool,
    /// Cloud account credential
    #[serde(flatten)]
    pub credential: CloudCredential,
    /// Target object type
    #[serde(rename = "bk_obj_id", default = "default_obj_id")]
    pub obj_id: String,
    /// Route attribute changes to confirmation instead of applying them
    #[serde(rename = "bk_attr_confirm", default)]
    pub confirm_attr_change: bool,
    /// Route new hosts to confirmation instead of creating them
    #[serde(rename = "bk_confirm", default)]
    pub confirm_new: bool,
    /// Cloud account type (e.g. `tencent_cloud`)
    #[serde(rename = "bk_account_type", default)]
    pub account_type: String,
    /// Cloud account administrator
    #[serde(rename = "bk_account_admin", default)]
    pub account_admin: String,
}

fn default_obj_id() -> String {
    DEFAULT_OBJ_ID.to_string()
}

impl CloudSyncTask {
    /// Create a new, enabled task with no confirmation policies
    pub fn new(name: impl Into<String>, period: Period, credential: CloudCredential) -> Self {
        let (period_type, value) = period.to_wire();
        Self {
            task_id: 0,
            name: name.into(),
            owner_id: String::new(),
            period_type: period_type.to_string(),
            period: value,
            enabled: true,
            credential,
            obj_id: default_obj_id(),
            confirm_attr_change: false,
            confirm_new: false,
            account_type: String::new(),
            account_admin: String::new(),
        }
    }

    /// Set the owning tenant
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Set the account administrator
    pub fn with_admin(mut self, admin: impl Into<String>) -> Self {
        self.account_admin = admin.into();
        self
    }

    /// Set both confirmation policies
    pub fn with_confirm(mut self, confirm_new: bool, confirm_attr_change: bool) -> Self {
        self.confirm_new = confirm_new;
        self.confirm_attr_change = confirm_attr_change;
        self
    }

    /// Enable or disable the task
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Parse the wire period into a schedule
    pub fn schedule(&self) -> Result<Period> {
        Period::parse(&self.period_type, &self.period)
    }
}

/// Filter for `ListTasks`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Match a single task id
    #[serde(rename = "bk_task_id", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Match a task name
    #[serde(rename = "bk_task_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Match the enabled flag
    #[serde(rename = "bk_status", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl TaskFilter {
    /// Every task
    pub fn all() -> Self {
        Self::default()
    }

    /// Only enabled tasks
    pub fn enabled() -> Self {
        Self {
            enabled: Some(true),
            ..Self::default()
        }
    }

    /// A single task by id
    pub fn by_id(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    /// Whether a task matches this filter
    pub fn matches(&self, task: &CloudSyncTask) -> bool {
        self.task_id.map_or(true, |id| id == task.task_id)
            && self.name.as_deref().map_or(true, |n| n == task.name)
            && self.enabled.map_or(true, |e| e == task.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_not_logged() {
        let cred = CloudCredential::new("AKID", "super-secret");
        let debug = format!("{:?}", cred);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("super-secret"));
        assert_eq!(cred.secret_key.expose_secret(), "super-secret");
    }

    #[test]
    fn test_task_wire_format() {
        let task = CloudSyncTask::new(
            "nightly",
            Period::Daily { hour: 2, minute: 30 },
            CloudCredential::new("id", "key"),
        )
        .with_owner("0");

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["bk_task_name"], "nightly");
        assert_eq!(json["bk_period_type"], "day");
        assert_eq!(json["bk_period"], "02:30");
        assert_eq!(json["bk_secret_id"], "id");
        assert_eq!(json["bk_secret_key"], "key");
        assert_eq!(json["bk_supplier_account"], "0");
        assert_eq!(json["bk_obj_id"], "host");

        let back: CloudSyncTask = serde_json::from_value(json).unwrap();
        assert_eq!(back.schedule().unwrap(), Period::Daily { hour: 2, minute: 30 });
    }

    #[test]
    fn test_task_defaults_on_sparse_record() {
        let task: CloudSyncTask = serde_json::from_value(serde_json::json!({
            "bk_task_id": 7,
            "bk_task_name": "sparse",
            "bk_period_type": "minute",
        }))
        .unwrap();

        assert_eq!(task.task_id, 7);
        assert!(!task.enabled);
        assert!(!task.confirm_new);
        assert_eq!(task.obj_id, "host");
        assert_eq!(task.schedule().unwrap(), Period::EveryFiveMinutes);
    }

    #[test]
    fn test_filter_matches() {
        let task = CloudSyncTask::new("a", Period::EveryFiveMinutes, CloudCredential::default());
        assert!(TaskFilter::all().matches(&task));
        assert!(TaskFilter::enabled().matches(&task));
        assert!(!TaskFilter::by_id(9).matches(&task));
        assert!(!TaskFilter::enabled().matches(&task.clone().with_enabled(false)));
    }
}
