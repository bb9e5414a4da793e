//! Shared Kubernetes utilities using kube-rs
//!
//! Velero hands every item to the plugin as an untyped object. The helpers
//! here narrow such an item to a typed view for reading, and edit its
//! labels and annotations in place so fields the typed view does not model
//! survive the round trip untouched.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use kube::core::ObjectMeta;
use kube::discovery::ApiResource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Error;

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for object types whose API version is fixed at compile
/// time so serialization and API calls agree on it.
pub trait HasApiResource {
    /// Full API version (e.g., "velero.io/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "Backup")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an ApiResource from an apiVersion string and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split an apiVersion into (group, version). Core types have an empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Lowercase plural of a kind, as used in resource paths.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

// =============================================================================
// Metadata helpers
// =============================================================================

/// Value of a label on `meta`, if set.
pub fn label<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.labels.as_ref()?.get(key).map(String::as_str)
}

/// Value of an annotation on `meta`, if set.
pub fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}

/// Whether `meta` carries `key=value` as a label.
pub fn has_label(meta: &ObjectMeta, key: &str, value: &str) -> bool {
    label(meta, key) == Some(value)
}

/// Whether `meta` carries Velero's exclusion label set to `true`.
pub fn is_excluded_by_label(meta: &ObjectMeta) -> bool {
    has_label(meta, crate::LABEL_EXCLUDE_FROM_BACKUP, "true")
}

// =============================================================================
// Untyped item handling
// =============================================================================

/// Accessors over the untyped object Velero passes to item actions.
pub trait ItemExt {
    /// The object's kind, or an empty string when absent.
    fn kind_str(&self) -> &str;
    /// The object's name, or an empty string when absent.
    fn name_str(&self) -> &str;
    /// The object's namespace, or an empty string for cluster-scoped objects.
    fn namespace_str(&self) -> &str;
    /// Narrow the item to a typed view.
    fn narrow<T: DeserializeOwned>(&self) -> Result<T, Error>;
    /// Mutable labels, created if missing.
    fn labels_mut(&mut self) -> &mut BTreeMap<String, String>;
    /// Mutable annotations, created if missing.
    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String>;
    /// Drop empty label/annotation maps so untouched items serialize as they arrived.
    fn prune_empty_metadata(&mut self);
}

impl ItemExt for DynamicObject {
    fn kind_str(&self) -> &str {
        self.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default()
    }

    fn name_str(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn namespace_str(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    fn narrow<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let kind = self.kind_str().to_string();
        let value = serde_json::to_value(self)
            .map_err(|e| Error::serialization_for_kind(kind.clone(), e.to_string()))?;
        serde_json::from_value(value).map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
    }

    fn labels_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.labels.get_or_insert_with(BTreeMap::new)
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }

    fn prune_empty_metadata(&mut self) {
        if self.metadata.labels.as_ref().is_some_and(BTreeMap::is_empty) {
            self.metadata.labels = None;
        }
        if self
            .metadata
            .annotations
            .as_ref()
            .is_some_and(BTreeMap::is_empty)
        {
            self.metadata.annotations = None;
        }
    }
}

/// Convert a typed object into the untyped item representation.
pub fn to_item<T: Serialize>(obj: &T) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(obj).map_err(|e| Error::serialization(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))
}

/// Mutable JSON object at `pointer` inside the item's body, if present.
///
/// `pointer` is relative to the object root (e.g. `/spec/template/spec`).
pub fn body_object_mut<'a>(
    item: &'a mut DynamicObject,
    pointer: &str,
) -> Option<&'a mut serde_json::Map<String, serde_json::Value>> {
    item.data.pointer_mut(pointer)?.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "cdi.kubevirt.io/v1beta1",
            "kind": "DataVolume",
            "metadata": {"name": "dv", "namespace": "ns"},
            "spec": {"source": {"blank": {}}, "storage": {"resources": {"requests": {"storage": "1Gi"}}}}
        }))
        .unwrap()
    }

    #[test]
    fn item_accessors_read_type_and_metadata() {
        let item = sample_item();
        assert_eq!(item.kind_str(), "DataVolume");
        assert_eq!(item.name_str(), "dv");
        assert_eq!(item.namespace_str(), "ns");
    }

    #[test]
    fn label_edits_keep_unmodelled_fields() {
        let mut item = sample_item();
        item.labels_mut().insert("a".into(), "b".into());
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["metadata"]["labels"]["a"], "b");
        assert_eq!(
            value["spec"]["storage"]["resources"]["requests"]["storage"],
            "1Gi"
        );
    }

    #[test]
    fn prune_drops_emptied_maps() {
        let mut item = sample_item();
        item.annotations_mut();
        item.prune_empty_metadata();
        assert!(item.metadata.annotations.is_none());
    }

    #[test]
    fn body_object_mut_reaches_nested_spec() {
        let mut item = sample_item();
        let spec = body_object_mut(&mut item, "/spec").unwrap();
        spec.remove("source");
        assert!(item.data.pointer("/spec/source").is_none());
        assert!(body_object_mut(&mut item, "/status").is_none());
    }

    #[test]
    fn pluralize_known_shapes() {
        assert_eq!(pluralize_kind("Backup"), "backups");
        assert_eq!(pluralize_kind("DeleteBackupRequest"), "deletebackuprequests");
        assert_eq!(pluralize_kind("Policy"), "policies");
        assert_eq!(parse_api_version("velero.io/v1"), ("velero.io".into(), "v1".into()));
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".into()));
    }

    #[test]
    fn exclusion_label_requires_true() {
        let mut meta = ObjectMeta::default();
        assert!(!is_excluded_by_label(&meta));
        meta.labels = Some(BTreeMap::from([(
            crate::LABEL_EXCLUDE_FROM_BACKUP.to_string(),
            "false".to_string(),
        )]));
        assert!(!is_excluded_by_label(&meta));
        meta.labels
            .as_mut()
            .unwrap()
            .insert(crate::LABEL_EXCLUDE_FROM_BACKUP.to_string(), "true".to_string());
        assert!(is_excluded_by_label(&meta));
    }
}
