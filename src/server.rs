//! HTTP transport for the item actions
//!
//! Velero-side glue posts one item at a time; each invocation runs under a
//! fresh cancellation token that fires after the configured hook timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kubevirt_velero_actions::{
    BackupOutcome, PluginManifestEntry, PluginRegistry, RestoreOutcome,
};
use kubevirt_velero_common::kube_utils::ItemExt;
use kubevirt_velero_common::velero::{Backup, Restore};
use kubevirt_velero_common::ResourceRef;

use crate::error::{Error, Result};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Registered actions
    pub registry: Arc<PluginRegistry>,
    /// Deadline for one invocation
    pub hook_timeout: Duration,
}

/// Body of `POST /v1/backup/{action}`
#[derive(Debug, Deserialize)]
pub struct BackupRequest {
    /// Item being backed up
    pub item: DynamicObject,
    /// Backup driving the operation
    pub backup: Backup,
}

/// Result of a backup hook
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    /// Item to store, absent when skipped
    pub item: Option<DynamicObject>,
    /// Objects to capture alongside
    pub additional_items: Vec<ResourceRef>,
    /// Leave the item out of the backup
    pub skip: bool,
}

impl From<BackupOutcome> for BackupResponse {
    fn from(outcome: BackupOutcome) -> Self {
        match outcome {
            BackupOutcome::Continue { item, extras } => Self {
                item: Some(item),
                additional_items: extras,
                skip: false,
            },
            BackupOutcome::Skip => Self {
                item: None,
                additional_items: Vec::new(),
                skip: true,
            },
        }
    }
}

/// Body of `POST /v1/restore/{action}`
#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    /// Item being restored
    pub item: DynamicObject,
    /// Restore driving the operation
    pub restore: Restore,
}

/// Result of a restore hook
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    /// Item to recreate
    pub item: DynamicObject,
    /// Objects to restore alongside
    pub additional_items: Vec<ResourceRef>,
    /// Keep the item out of the cluster
    pub skip_restore: bool,
}

impl From<RestoreOutcome> for RestoreResponse {
    fn from(outcome: RestoreOutcome) -> Self {
        Self {
            item: outcome.item,
            additional_items: outcome.extras,
            skip_restore: outcome.skip_restore,
        }
    }
}

/// Cancellation token that fires once the hook timeout elapses.
///
/// Dropping the deadline cancels the token and stops the timer.
struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            }
        });
        Self { token, timer }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.token.cancel();
        self.timer.abort();
    }
}

/// Build the hook router
pub fn hook_routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/v1/plugins", get(list_plugins))
        .route("/v1/backup/{action}", post(run_backup))
        .route("/v1/restore/{action}", post(run_restore))
        .with_state(state)
}

async fn list_plugins(State(state): State<AppState>) -> Json<Vec<PluginManifestEntry>> {
    Json(state.registry.manifest())
}

async fn run_backup(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(request): Json<BackupRequest>,
) -> Result<Json<BackupResponse>> {
    let hook = state
        .registry
        .backup_action(&action)
        .ok_or_else(|| Error::unknown_action("backup", &action))?;

    let kind = request.item.kind_str().to_string();
    let namespace = request.item.namespace_str().to_string();
    let name = request.item.name_str().to_string();
    debug!(action = %action, kind = %kind, namespace = %namespace, name = %name, "backup hook invoked");

    let deadline = Deadline::start(state.hook_timeout);
    let outcome = hook
        .execute(request.item, &request.backup, &deadline.token)
        .await
        .inspect_err(|e| {
            warn!(
                action = %action,
                kind = %kind,
                namespace = %namespace,
                name = %name,
                error = %e,
                "backup hook failed"
            )
        })?;
    Ok(Json(outcome.into()))
}

async fn run_restore(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<RestoreResponse>> {
    let hook = state
        .registry
        .restore_action(&action)
        .ok_or_else(|| Error::unknown_action("restore", &action))?;

    let kind = request.item.kind_str().to_string();
    let namespace = request.item.namespace_str().to_string();
    let name = request.item.name_str().to_string();
    debug!(action = %action, kind = %kind, namespace = %namespace, name = %name, "restore hook invoked");

    let deadline = Deadline::start(state.hook_timeout);
    let outcome = hook
        .execute(request.item, &request.restore, &deadline.token)
        .await
        .inspect_err(|e| {
            warn!(
                action = %action,
                kind = %kind,
                namespace = %namespace,
                name = %name,
                error = %e,
                "restore hook failed"
            )
        })?;
    Ok(Json(outcome.into()))
}

/// Serve `router` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "hook server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down hook server"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await
        }
    }
}
