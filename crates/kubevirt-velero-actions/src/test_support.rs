//! Shared fixtures for action tests

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::DynamicObject;
use mockall::mock;
use serde_json::Value;

use kubevirt_velero_common::crd::{DataVolume, VirtualMachine};
use kubevirt_velero_common::velero::{Backup, BackupSpec, Restore, RestoreSpec};
use kubevirt_velero_graph::{ClusterLookup, LookupError};

mock! {
    pub Lookup {}

    #[async_trait::async_trait]
    impl ClusterLookup for Lookup {
        async fn list_claims(
            &self,
            label_selector: &str,
            namespace: &str,
        ) -> Result<Vec<PersistentVolumeClaim>, LookupError>;
        async fn list_runner_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError>;
        async fn get_runner_pod(
            &self,
            instance_name: &str,
            namespace: &str,
        ) -> Result<Option<Pod>, LookupError>;
        async fn get_data_volume(&self, namespace: &str, name: &str)
            -> Result<DataVolume, LookupError>;
        async fn get_virtual_machine(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<VirtualMachine, LookupError>;
    }
}

/// Untyped item from JSON
pub fn item(value: Value) -> DynamicObject {
    serde_json::from_value(value).unwrap()
}

/// Backup including `resources` (empty for everything)
pub fn backup(resources: &[&str]) -> Backup {
    Backup::new(
        "test-backup",
        "velero",
        BackupSpec {
            included_resources: resources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
    )
}

/// Restore carrying the given request labels
pub fn restore(labels: &[(&str, &str)]) -> Restore {
    let mut restore = Restore::new(
        "test-restore",
        "velero",
        RestoreSpec {
            backup_name: "test-backup".to_string(),
            ..Default::default()
        },
    );
    if !labels.is_empty() {
        restore.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
    }
    restore
}

/// Data volume in `phase`
pub fn data_volume(name: &str, phase: &str) -> DataVolume {
    serde_json::from_value(serde_json::json!({
        "metadata": {"name": name, "namespace": "ns"},
        "status": {"phase": phase}
    }))
    .unwrap()
}

/// Label value on an item
pub fn label<'a>(item: &'a DynamicObject, key: &str) -> Option<&'a str> {
    item.metadata.labels.as_ref()?.get(key).map(String::as_str)
}

/// Annotation value on an item
pub fn annotation<'a>(item: &'a DynamicObject, key: &str) -> Option<&'a str> {
    item.metadata
        .annotations
        .as_ref()?
        .get(key)
        .map(String::as_str)
}
