//! Velero include/exclude semantics
//!
//! Pure predicates over a [`Backup`]. Resource names are compared after
//! normalisation: lowercased, group suffix split off, plural folded to
//! singular, so `Pods`, `pod` and `pods` all name the same resource.

use kubevirt_velero_common::velero::Backup;
use kubevirt_velero_common::LABEL_METADATA_BACKUP;

/// A resource name reduced to (singular resource, optional group)
#[derive(Debug, PartialEq, Eq)]
struct Canonical {
    resource: String,
    group: Option<String>,
}

fn canonicalize(name: &str) -> Canonical {
    let lower = name.trim().to_ascii_lowercase();
    let (resource, group) = match lower.split_once('.') {
        Some((r, g)) => (r.to_string(), Some(g.to_string())),
        None => (lower, None),
    };
    Canonical {
        resource: singular(&resource),
        group,
    }
}

fn singular(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if let Some(stem) = resource.strip_suffix("sses") {
        return format!("{}ss", stem);
    }
    if resource.ends_with("ss") {
        return resource.to_string();
    }
    resource.strip_suffix('s').unwrap_or(resource).to_string()
}

fn matches(pattern: &str, resource: &Canonical) -> bool {
    if pattern.trim() == "*" {
        return true;
    }
    let pattern = canonicalize(pattern);
    if pattern.resource != resource.resource {
        return false;
    }
    match (&pattern.group, &resource.group) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Whether `resource` appears in the backup's excluded resources
pub fn is_resource_excluded(resource: &str, backup: &Backup) -> bool {
    let canonical = canonicalize(resource);
    backup
        .spec
        .excluded_resources
        .iter()
        .any(|p| matches(p, &canonical))
}

/// Whether the backup captures `resource`.
///
/// An empty include list means every resource; excludes always win.
pub fn is_resource_included(resource: &str, backup: &Backup) -> bool {
    let canonical = canonicalize(resource);
    let included = backup.spec.included_resources.is_empty()
        || backup
            .spec
            .included_resources
            .iter()
            .any(|p| matches(p, &canonical));
    included && !is_resource_excluded(resource, backup)
}

/// Whether objects of `resource` end up in the backup artifact.
///
/// Shares the empty-means-everything reading with [`is_resource_included`].
pub fn is_resource_in_backup(resource: &str, backup: &Backup) -> bool {
    is_resource_included(resource, backup)
}

/// Whether the request is a metadata-only backup (volume completeness is not checked)
pub fn is_metadata_backup(backup: &Backup) -> bool {
    backup.label(LABEL_METADATA_BACKUP) == Some("true")
}
