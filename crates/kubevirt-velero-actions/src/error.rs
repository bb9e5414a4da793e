//! Item action errors
//!
//! Skips are not errors; they are expressed through the action outcomes.

use kube::api::DynamicObject;
use thiserror::Error;

use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::ResourceRef;
use kubevirt_velero_graph::{AggregateError, LookupError, ObjectGraph, SafetyError};

/// Errors returned by item actions
#[derive(Debug, Error)]
pub enum ActionError {
    /// The request would produce an unrestorable backup; Velero fails the item
    #[error("cannot safely back up {kind} {namespace}/{name}: {reason}")]
    Rejected {
        /// Item kind
        kind: String,
        /// Item namespace
        namespace: String,
        /// Item name
        name: String,
        /// Why the request is unsafe
        reason: String,
    },

    /// Graph expansion hit lookup failures; carries what was collected
    #[error("incomplete object graph ({} refs collected): {source}", .partial.len())]
    Degraded {
        /// References collected before and after the failures
        partial: Vec<ResourceRef>,
        /// Every lookup failure
        #[source]
        source: AggregateError,
    },

    /// The item could not be narrowed to its typed view
    #[error("malformed {kind} item: {message}")]
    Malformed {
        /// Item kind
        kind: String,
        /// Conversion failure
        message: String,
    },

    /// A lookup needed to decide policy failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl ActionError {
    /// Reject `item` with `reason`
    pub fn rejected(item: &DynamicObject, reason: impl Into<String>) -> Self {
        Self::Rejected {
            kind: item.kind_str().to_string(),
            namespace: item.namespace_str().to_string(),
            name: item.name_str().to_string(),
            reason: reason.into(),
        }
    }

    /// Map a safety failure on `item` to an action error
    pub fn from_safety(item: &DynamicObject, err: SafetyError) -> Self {
        match err {
            SafetyError::Unsafe { reason } => Self::rejected(item, reason),
            SafetyError::Lookup(e) => Self::Lookup(e),
        }
    }

    /// Whether the hook ran out of time
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Degraded { source, .. } => source.is_cancelled(),
            Self::Lookup(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Narrow `item` to a typed view, reporting failures as `Malformed`.
pub(crate) fn narrow<T: serde::de::DeserializeOwned>(
    item: &DynamicObject,
) -> Result<T, ActionError> {
    item.narrow().map_err(|e| ActionError::Malformed {
        kind: item.kind_str().to_string(),
        message: e.to_string(),
    })
}

/// Append `graph` to `extras`; lookup failures turn the result into `Degraded`.
pub(crate) fn collect_graph(
    mut extras: Vec<ResourceRef>,
    graph: ObjectGraph,
) -> Result<Vec<ResourceRef>, ActionError> {
    let (refs, err) = graph.into_parts();
    extras.extend(refs);
    let extras = kubevirt_velero_graph::dedup_refs(extras);
    match err {
        None => Ok(extras),
        Some(source) => Err(ActionError::Degraded {
            partial: extras,
            source,
        }),
    }
}
