//! Velero item actions for KubeVirt workloads
//!
//! Each action is invoked by Velero for one object at a time. Backup actions
//! may veto unsafe requests, annotate the captured copy and name extra
//! objects that must be captured with it. Restore actions undo backup-time
//! bookkeeping, rewrite objects that cannot be recreated verbatim, and name
//! the objects that must be restored alongside.

pub mod action;
pub mod backup;
pub mod error;
pub mod identity;
pub mod registry;
pub mod restore;

#[cfg(test)]
pub(crate) mod test_support;

pub use action::{
    BackupItemAction, BackupOutcome, ResourceSelector, RestoreItemAction, RestoreOutcome,
};
pub use error::ActionError;
pub use registry::{PluginKind, PluginManifestEntry, PluginRegistry};
