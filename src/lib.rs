//! KubeVirt plugin for Velero
//!
//! Serves the backup and restore item actions from
//! `kubevirt-velero-actions` over HTTP.

pub mod config;
pub mod error;
pub mod server;

pub use config::{Command, Config};
pub use error::{Error, Result};
