//! Object graph expansion for KubeVirt backups
//!
//! A virtual machine is a graph of objects: the VM, its running instance,
//! the runner pod, DataVolumes and claims, instancetypes with their
//! revisions, and supporting secrets/config maps. This crate decides which
//! of those travel together:
//!
//! - **lookup**: read-only cluster facade (`ClusterLookup`), the only I/O
//! - **inclusion**: Velero include/exclude semantics over a `Backup`
//! - **graph**: ordered reference lists for backup and restore
//! - **safety**: whether a backup request yields a restorable artifact

pub mod error;
pub mod graph;
pub mod inclusion;
pub mod lookup;
pub mod safety;

pub use error::{AggregateError, LookupError};
pub use graph::{claim_restore_graph, dedup_refs, GraphBuilder, GraphMode, GraphRoot, ObjectGraph};
pub use lookup::{ClusterLookup, KubeLookup, ScopedLookup};
pub use safety::{assess_instance, vm_can_be_safely_backed_up, InstanceVerdict, SafetyError};
