//! Velero resource types
//!
//! Typed structs for the Velero requests the plugin reads (Backup, Restore)
//! and the ones the CLI creates (Backup, Restore, DeleteBackupRequest).
//! These implement `HasApiResource` for consistent API version handling.

use std::collections::BTreeMap;

use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::kube_utils::{label, HasApiResource};

/// Velero namespace where Backup/Restore resources live by default
pub const VELERO_NAMESPACE: &str = "velero";

fn object_meta(name: impl Into<String>, namespace: impl Into<String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(namespace.into()),
        ..Default::default()
    }
}

// =============================================================================
// Backup
// =============================================================================

/// Velero Backup resource
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// API version
    #[serde(default = "Backup::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "Backup::default_kind")]
    pub kind: String,
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Backup specification
    #[serde(default)]
    pub spec: BackupSpec,
    /// Backup status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl HasApiResource for Backup {
    const API_VERSION: &'static str = "velero.io/v1";
    const KIND: &'static str = "Backup";
}

impl Backup {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new Backup
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, spec: BackupSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata: object_meta(name, namespace),
            spec,
            status: None,
        }
    }

    /// Backup name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Value of a label on the backup request
    pub fn label(&self, key: &str) -> Option<&str> {
        label(&self.metadata, key)
    }

    /// Current phase, if reported
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref()?.phase.as_deref()
    }
}

/// Backup spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Included namespaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,
    /// Excluded namespaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,
    /// Included resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<String>,
    /// Excluded resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_resources: Vec<String>,
    /// Label selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    /// Storage location name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    /// Volume snapshot locations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_snapshot_locations: Vec<String>,
    /// Snapshot volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_volumes: Option<bool>,
    /// TTL for the backup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

/// Backup/Restore status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    /// Phase (New, InProgress, Completed, PartiallyFailed, Failed, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Label selector for backup/restore filtering
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Match labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Parse a `k=v,k2=v2` selector string (equality terms only).
    pub fn parse(selector: &str) -> Result<Self, crate::Error> {
        let mut match_labels = BTreeMap::new();
        for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = term.split_once('=').ok_or_else(|| {
                crate::Error::validation_for_field(
                    "labelSelector",
                    format!("unsupported selector term '{}', expected key=value", term),
                )
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(crate::Error::validation_for_field(
                    "labelSelector",
                    format!("empty key in selector term '{}'", term),
                ));
            }
            match_labels.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { match_labels })
    }

    /// Whether `labels` satisfies every term; an empty selector matches everything.
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }
}

// =============================================================================
// Restore
// =============================================================================

/// Velero Restore resource
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restore {
    /// API version
    #[serde(default = "Restore::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "Restore::default_kind")]
    pub kind: String,
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Restore specification
    #[serde(default)]
    pub spec: RestoreSpec,
    /// Restore status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl HasApiResource for Restore {
    const API_VERSION: &'static str = "velero.io/v1";
    const KIND: &'static str = "Restore";
}

impl Restore {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new Restore
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, spec: RestoreSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata: object_meta(name, namespace),
            spec,
            status: None,
        }
    }

    /// Restore name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Value of a label on the restore request
    pub fn label(&self, key: &str) -> Option<&str> {
        label(&self.metadata, key)
    }

    /// Current phase, if reported
    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref()?.phase.as_deref()
    }
}

/// Restore spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    /// Name of the Velero Backup to restore from
    #[serde(default)]
    pub backup_name: String,
    /// Included namespaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,
    /// Included resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<String>,
    /// Label selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    /// Restore PVs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_pvs: Option<bool>,
}

// =============================================================================
// DeleteBackupRequest
// =============================================================================

/// Velero DeleteBackupRequest resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBackupRequest {
    /// API version
    #[serde(default = "DeleteBackupRequest::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "DeleteBackupRequest::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// Request specification
    pub spec: DeleteBackupRequestSpec,
}

impl HasApiResource for DeleteBackupRequest {
    const API_VERSION: &'static str = "velero.io/v1";
    const KIND: &'static str = "DeleteBackupRequest";
}

impl DeleteBackupRequest {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a request deleting `backup_name`
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        backup_name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata: object_meta(name, namespace),
            spec: DeleteBackupRequestSpec {
                backup_name: backup_name.into(),
            },
        }
    }
}

/// DeleteBackupRequest spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBackupRequestSpec {
    /// Backup to delete
    pub backup_name: String,
}
