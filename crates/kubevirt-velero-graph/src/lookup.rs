//! Read-only cluster facade
//!
//! Everything the graph engine and the safety predicate need to know about
//! the live cluster goes through [`ClusterLookup`]. The trait is mocked in
//! tests; [`KubeLookup`] talks to the API server.

use std::future::Future;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use kubevirt_velero_common::crd::{DataVolume, VirtualMachine};
use kubevirt_velero_common::kube_utils::{annotation, ItemExt};
use kubevirt_velero_common::{ResourceKind, ANN_DOMAIN, VIRT_LAUNCHER_SELECTOR};

use crate::error::LookupError;

/// Read-only queries against the cluster
///
/// Implementations must be safe to share across concurrent hook
/// invocations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterLookup: Send + Sync {
    /// List claims in `namespace` matching a `key=value` label selector
    async fn list_claims(
        &self,
        label_selector: &str,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, LookupError>;

    /// List virt-launcher pods in `namespace`
    async fn list_runner_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError>;

    /// Find the runner pod of the named instance, if one exists
    async fn get_runner_pod(
        &self,
        instance_name: &str,
        namespace: &str,
    ) -> Result<Option<Pod>, LookupError>;

    /// Get a DataVolume
    async fn get_data_volume(&self, namespace: &str, name: &str)
        -> Result<DataVolume, LookupError>;

    /// Get a VirtualMachine
    async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<VirtualMachine, LookupError>;
}

/// Pick the runner pod of `instance_name` out of a namespace's launcher pods.
///
/// Launcher pods carry the owning instance name in the `kubevirt.io/domain`
/// annotation.
pub fn select_runner_pod(pods: Vec<Pod>, instance_name: &str) -> Option<Pod> {
    pods.into_iter()
        .find(|pod| annotation(&pod.metadata, ANN_DOMAIN) == Some(instance_name))
}

/// [`ClusterLookup`] backed by a kube-rs client
#[derive(Clone)]
pub struct KubeLookup {
    client: Client,
}

impl KubeLookup {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<T, LookupError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource());
        let item = api
            .get(name)
            .await
            .map_err(|e| LookupError::from_get(e, kind.kind_str(), namespace, name))?;
        item.narrow().map_err(|e| LookupError::Malformed {
            kind: kind.kind_str().to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ClusterLookup for KubeLookup {
    async fn list_claims(
        &self,
        label_selector: &str,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, LookupError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let mut params = ListParams::default();
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }
        let list = api
            .list(&params)
            .await
            .map_err(|e| LookupError::from_list(e, "claims", namespace))?;
        debug!(
            namespace = %namespace,
            selector = %label_selector,
            count = list.items.len(),
            "listed claims"
        );
        Ok(list.items)
    }

    async fn list_runner_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(VIRT_LAUNCHER_SELECTOR))
            .await
            .map_err(|e| LookupError::from_list(e, "launcher pods", namespace))?;
        Ok(list.items)
    }

    async fn get_runner_pod(
        &self,
        instance_name: &str,
        namespace: &str,
    ) -> Result<Option<Pod>, LookupError> {
        let pods = self.list_runner_pods(namespace).await?;
        Ok(select_runner_pod(pods, instance_name))
    }

    async fn get_data_volume(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DataVolume, LookupError> {
        self.get_typed(ResourceKind::DataVolume, namespace, name)
            .await
    }

    async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<VirtualMachine, LookupError> {
        self.get_typed(ResourceKind::VirtualMachine, namespace, name)
            .await
    }
}

/// A lookup bound to one hook invocation's cancellation token.
///
/// Every call races the token; once it fires, pending and future calls
/// resolve to [`LookupError::Cancelled`] without touching the cluster.
#[derive(Clone, Copy)]
pub struct ScopedLookup<'a> {
    lookup: &'a dyn ClusterLookup,
    cancel: &'a CancellationToken,
}

impl<'a> ScopedLookup<'a> {
    /// Bind `lookup` to `cancel`
    pub fn new(lookup: &'a dyn ClusterLookup, cancel: &'a CancellationToken) -> Self {
        Self { lookup, cancel }
    }

    /// Whether the invocation has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn guard<T, F>(&self, fut: F) -> Result<T, LookupError>
    where
        F: Future<Output = Result<T, LookupError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(LookupError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(LookupError::Cancelled),
            res = fut => res,
        }
    }

    /// See [`ClusterLookup::list_claims`]
    pub async fn list_claims(
        &self,
        label_selector: &str,
        namespace: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, LookupError> {
        self.guard(self.lookup.list_claims(label_selector, namespace))
            .await
    }

    /// See [`ClusterLookup::list_runner_pods`]
    pub async fn list_runner_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError> {
        self.guard(self.lookup.list_runner_pods(namespace)).await
    }

    /// See [`ClusterLookup::get_runner_pod`]
    pub async fn get_runner_pod(
        &self,
        instance_name: &str,
        namespace: &str,
    ) -> Result<Option<Pod>, LookupError> {
        self.guard(self.lookup.get_runner_pod(instance_name, namespace))
            .await
    }

    /// See [`ClusterLookup::get_data_volume`]
    pub async fn get_data_volume(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DataVolume, LookupError> {
        self.guard(self.lookup.get_data_volume(namespace, name))
            .await
    }

    /// See [`ClusterLookup::get_virtual_machine`]
    pub async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<VirtualMachine, LookupError> {
        self.guard(self.lookup.get_virtual_machine(namespace, name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn launcher(name: &str, domain: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: Some(BTreeMap::from([(
                    ANN_DOMAIN.to_string(),
                    domain.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn runner_pod_is_matched_by_domain_annotation() {
        let pods = vec![
            launcher("virt-launcher-other-abcde", "other"),
            launcher("virt-launcher-vm-fghij", "vm"),
        ];
        let pod = select_runner_pod(pods, "vm").unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("virt-launcher-vm-fghij"));
    }

    #[test]
    fn runner_pod_absent_when_no_annotation_matches() {
        let pods = vec![launcher("virt-launcher-other-abcde", "other"), Pod::default()];
        assert!(select_runner_pod(pods, "vm").is_none());
    }

    #[tokio::test]
    async fn scoped_lookup_passes_through_when_live() {
        let mut mock = MockClusterLookup::new();
        mock.expect_get_runner_pod()
            .returning(|name, _| Ok(Some(launcher("virt-launcher-x", name))));

        let cancel = CancellationToken::new();
        let scoped = ScopedLookup::new(&mock, &cancel);
        let pod = scoped.get_runner_pod("vm", "ns").await.unwrap().unwrap();
        assert_eq!(
            annotation(&pod.metadata, ANN_DOMAIN),
            Some("vm"),
            "argument forwarded"
        );
    }

    #[tokio::test]
    async fn scoped_lookup_short_circuits_after_cancel() {
        // No expectations: any call into the mock would panic.
        let mock = MockClusterLookup::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scoped = ScopedLookup::new(&mock, &cancel);
        assert!(scoped.is_cancelled());
        let err = scoped.list_claims("a=b", "ns").await.unwrap_err();
        assert!(err.is_cancelled());
        let err = scoped.list_runner_pods("ns").await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn scoped_runner_pod_listing_forwards_namespace() {
        let mut mock = MockClusterLookup::new();
        mock.expect_list_runner_pods().times(1).returning(|namespace| {
            assert_eq!(namespace, "vms");
            Ok(vec![launcher("virt-launcher-vm-abcde", "vm")])
        });

        let cancel = CancellationToken::new();
        let pods = ScopedLookup::new(&mock, &cancel)
            .list_runner_pods("vms")
            .await
            .unwrap();
        assert_eq!(pods.len(), 1);
    }
}
