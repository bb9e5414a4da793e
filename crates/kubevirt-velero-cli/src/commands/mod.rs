//! CLI commands

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use clap::Args;
use kube::api::{Api, DynamicObject, PostParams};
use kube::Client;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use kubevirt_velero_common::kube_utils::{to_item, HasApiResource};
use kubevirt_velero_common::velero::LabelSelector;

use crate::{Error, Result};

pub mod backup;
pub mod delete_backup;
pub mod restore;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Which objects a backup or restore covers
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Namespaces to include (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub include_namespaces: Vec<String>,

    /// Resources to include (comma separated, e.g. virtualmachines,datavolumes)
    #[arg(long, value_delimiter = ',')]
    pub include_resources: Vec<String>,

    /// Label selector (`key=value[,key=value]`)
    #[arg(long, short = 'l')]
    pub selector: Option<String>,
}

impl FilterArgs {
    /// Parsed label selector, if one was given
    pub fn label_selector(&self) -> Result<Option<LabelSelector>> {
        self.selector
            .as_deref()
            .map(LabelSelector::parse)
            .transpose()
            .map_err(Error::from)
    }
}

/// Waiting for a request to finish
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Wait until Velero reports the request Completed; fail otherwise
    #[arg(long)]
    pub verify_succeeded: bool,

    /// How long to wait with --verify-succeeded
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,
}

/// Result type for polling check functions.
///
/// - `Ok(Some(value))` - Condition met, return the value
/// - `Ok(None)` - Condition not met yet, keep polling
/// - `Err(e)` - Fatal error, stop polling immediately
pub type PollResult<T> = std::result::Result<Option<T>, String>;

/// Poll `check_fn` every `interval` until it yields a value, fails, or `timeout` passes.
pub async fn wait_with_timeout<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    description: &str,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(Error::command_failed(format!(
                "Timeout waiting for {}",
                description
            )));
        }

        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                debug!("Waiting for {}...", description);
                tokio::time::sleep(interval).await;
            }
            Err(e) => {
                return Err(Error::command_failed(format!(
                    "Error waiting for {}: {}",
                    description, e
                )));
            }
        }
    }
}

/// Map a Velero request phase to a poll result.
///
/// `Completed` finishes the wait; failure phases abort it; anything else
/// (including no phase yet) keeps polling.
pub fn phase_outcome(phase: Option<&str>) -> PollResult<()> {
    match phase {
        Some("Completed") => Ok(Some(())),
        Some(p @ ("Failed" | "PartiallyFailed" | "FailedValidation")) => {
            Err(format!("request finished in phase {}", p))
        }
        _ => Ok(None),
    }
}

/// Build a kube [`Client`] from the ambient kubeconfig or in-cluster config.
pub async fn kube_client() -> Result<Client> {
    Client::try_default().await.cmd_err()
}

fn request_api<T: HasApiResource>(client: Client, namespace: &str) -> Api<DynamicObject> {
    Api::namespaced_with(client, namespace, &T::api_resource())
}

/// Create a Velero request object.
pub async fn create_request<T>(client: Client, namespace: &str, name: &str, request: &T) -> Result<()>
where
    T: HasApiResource + serde::Serialize,
{
    let api = request_api::<T>(client, namespace);
    let item = to_item(request)?;
    api.create(&PostParams::default(), &item).await.map_err(|e| {
        Error::command_failed(format!("failed to create {} {}: {}", T::KIND, name, e))
    })?;
    info!(kind = T::KIND, name = %name, namespace = %namespace, "created request");
    Ok(())
}

/// Wait until a Velero request reaches `Completed`.
pub async fn verify_succeeded<T: HasApiResource>(
    client: Client,
    namespace: &str,
    name: &str,
    args: &VerifyArgs,
) -> Result<()> {
    let api = request_api::<T>(client, namespace);
    let description = format!("{} {} to complete", T::KIND, name);
    wait_with_timeout(
        Duration::from_secs(args.timeout_secs),
        Duration::from_secs(5),
        &description,
        || {
            let api = api.clone();
            async move {
                let obj = api.get(name).await.map_err(|e| e.to_string())?;
                let phase = obj.data.pointer("/status/phase").and_then(Value::as_str);
                phase_outcome(phase)
            }
        },
    )
    .await
}
