//! Claim identity labeling
//!
//! During a backup, claims and the snapshots taken from them are labelled
//! with the claim's uid so a later restore can select one claim (and its
//! snapshots) by label. A value the user had already put under that label
//! is parked in a companion annotation and put back on restore; a label
//! the backup introduced is removed on restore.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use kube::core::ObjectMeta;
use parking_lot::Mutex;
use tracing::debug;

use kubevirt_velero_common::LABEL_ORIGINAL_PVC_UID;
use kubevirt_velero_graph::{LookupError, ScopedLookup};

/// Label `meta` with `uid`, parking any previous label value under `preserve_annotation`.
///
/// An empty uid leaves the object untouched. Returns whether anything changed.
pub fn stamp_identity(meta: &mut ObjectMeta, uid: &str, preserve_annotation: &str) -> bool {
    if uid.is_empty() {
        return false;
    }
    let labels = meta.labels.get_or_insert_with(Default::default);
    if let Some(previous) = labels.get(LABEL_ORIGINAL_PVC_UID).cloned() {
        meta.annotations
            .get_or_insert_with(Default::default)
            .insert(preserve_annotation.to_string(), previous);
    }
    meta.labels
        .get_or_insert_with(Default::default)
        .insert(LABEL_ORIGINAL_PVC_UID.to_string(), uid.to_string());
    true
}

/// Undo [`stamp_identity`]: restore the parked value or drop the label.
pub fn reverse_identity(meta: &mut ObjectMeta, preserve_annotation: &str) {
    let has_label = meta
        .labels
        .as_ref()
        .is_some_and(|l| l.contains_key(LABEL_ORIGINAL_PVC_UID));
    if !has_label {
        return;
    }

    let preserved = meta
        .annotations
        .as_mut()
        .and_then(|a| a.remove(preserve_annotation));
    if let Some(labels) = meta.labels.as_mut() {
        match preserved {
            Some(value) => {
                labels.insert(LABEL_ORIGINAL_PVC_UID.to_string(), value);
            }
            None => {
                labels.remove(LABEL_ORIGINAL_PVC_UID);
            }
        }
        if labels.is_empty() {
            meta.labels = None;
        }
    }
    if meta.annotations.as_ref().is_some_and(|a| a.is_empty()) {
        meta.annotations = None;
    }
}

/// Backups whose claim listings are kept; the oldest is evicted first
const LIVE_SESSIONS: usize = 4;

/// Per-backup cache of claim uids, keyed by backup and namespace.
///
/// The first lookup in a namespace lists all its claims once; later lookups
/// for the same backup and namespace are answered from memory. Concurrent
/// backups keep separate listings.
#[derive(Default)]
pub struct ClaimUidCache {
    sessions: Mutex<VecDeque<String>>,
    claims: DashMap<(String, String), HashMap<String, String>>,
}

impl ClaimUidCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Uid of claim `name` in `namespace` as seen during backup `session`.
    ///
    /// `Ok(None)` when the claim does not exist or has no uid.
    pub async fn uid_of(
        &self,
        session: &str,
        namespace: &str,
        name: &str,
        lookup: ScopedLookup<'_>,
    ) -> Result<Option<String>, LookupError> {
        self.touch_session(session);

        let key = (session.to_string(), namespace.to_string());
        if let Some(claims) = self.claims.get(&key) {
            return Ok(claims.get(name).cloned());
        }

        let claims = lookup.list_claims("", namespace).await?;
        let uids: HashMap<String, String> = claims
            .into_iter()
            .filter_map(|c| Some((c.metadata.name?, c.metadata.uid?)))
            .filter(|(_, uid)| !uid.is_empty())
            .collect();
        debug!(backup = %session, namespace = %namespace, claims = uids.len(), "cached claim uids");

        let uid = uids.get(name).cloned();
        self.store(key, uids);
        Ok(uid)
    }

    fn touch_session(&self, session: &str) {
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| s == session) {
            return;
        }
        sessions.push_back(session.to_string());
        while sessions.len() > LIVE_SESSIONS {
            let Some(evicted) = sessions.pop_front() else {
                break;
            };
            debug!(backup = %evicted, "evicting claim uids");
            self.claims.retain(|(backup, _), _| *backup != evicted);
        }
    }

    /// Keep a listing only while its backup is live.
    fn store(&self, key: (String, String), uids: HashMap<String, String>) {
        let sessions = self.sessions.lock();
        if sessions.contains(&key.0) {
            self.claims.entry(key).or_insert(uids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
    use tokio_util::sync::CancellationToken;

    use kubevirt_velero_common::crd::{DataVolume, VirtualMachine};
    use kubevirt_velero_graph::ClusterLookup;

    use kubevirt_velero_common::ANN_ORIGINAL_PVC_UID_BEFORE_BACKUP as PRESERVE;

    use crate::test_support::MockLookup;

    fn meta(labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some("disk".to_string()),
            labels: (!labels.is_empty()).then(|| {
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>()
            }),
            ..Default::default()
        }
    }

    fn claim(name: &str, uid: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: Some(uid.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    // =========================================================================
    // Label round trip
    // =========================================================================

    #[test]
    fn fresh_label_is_removed_on_restore() {
        let original = meta(&[("app", "db")]);
        let mut m = original.clone();

        assert!(stamp_identity(&mut m, "uid-1", PRESERVE));
        assert_eq!(m.labels.as_ref().unwrap()[LABEL_ORIGINAL_PVC_UID], "uid-1");
        assert!(m.annotations.is_none());

        reverse_identity(&mut m, PRESERVE);
        assert_eq!(m, original);
    }

    #[test]
    fn user_value_survives_round_trip() {
        let original = meta(&[(LABEL_ORIGINAL_PVC_UID, "mine")]);
        let mut m = original.clone();

        stamp_identity(&mut m, "uid-1", PRESERVE);
        assert_eq!(m.labels.as_ref().unwrap()[LABEL_ORIGINAL_PVC_UID], "uid-1");
        assert_eq!(m.annotations.as_ref().unwrap()[PRESERVE], "mine");

        reverse_identity(&mut m, PRESERVE);
        assert_eq!(m, original);
    }

    #[test]
    fn empty_uid_is_a_no_op() {
        let original = meta(&[(LABEL_ORIGINAL_PVC_UID, "mine")]);
        let mut m = original.clone();
        assert!(!stamp_identity(&mut m, "", PRESERVE));
        assert_eq!(m, original);
    }

    #[test]
    fn reverse_without_label_leaves_object_alone() {
        let mut m = meta(&[("app", "db")]);
        m.annotations = Some(BTreeMap::from([(PRESERVE.to_string(), "stale".to_string())]));
        let before = m.clone();
        reverse_identity(&mut m, PRESERVE);
        assert_eq!(m, before);
    }

    // =========================================================================
    // Uid cache
    // =========================================================================

    /// Hands out queued listings in call order; the first listing is held
    /// back until `release` fires.
    struct GatedLookup {
        listings: parking_lot::Mutex<Vec<Vec<PersistentVolumeClaim>>>,
        calls: AtomicUsize,
        release: CancellationToken,
    }

    impl GatedLookup {
        fn new(listings: Vec<Vec<PersistentVolumeClaim>>) -> Self {
            Self {
                listings: parking_lot::Mutex::new(listings.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
                release: CancellationToken::new(),
            }
        }
    }

    fn unexpected(namespace: &str) -> LookupError {
        LookupError::NotFound {
            kind: "Unexpected".to_string(),
            namespace: namespace.to_string(),
            name: String::new(),
        }
    }

    #[async_trait]
    impl ClusterLookup for GatedLookup {
        async fn list_claims(
            &self,
            _label_selector: &str,
            namespace: &str,
        ) -> Result<Vec<PersistentVolumeClaim>, LookupError> {
            let first = self.calls.fetch_add(1, Ordering::SeqCst) == 0;
            let listing = self.listings.lock().pop();
            if first {
                self.release.cancelled().await;
            }
            listing.ok_or_else(|| unexpected(namespace))
        }

        async fn list_runner_pods(&self, namespace: &str) -> Result<Vec<Pod>, LookupError> {
            Err(unexpected(namespace))
        }

        async fn get_runner_pod(
            &self,
            _instance_name: &str,
            namespace: &str,
        ) -> Result<Option<Pod>, LookupError> {
            Err(unexpected(namespace))
        }

        async fn get_data_volume(
            &self,
            namespace: &str,
            _name: &str,
        ) -> Result<DataVolume, LookupError> {
            Err(unexpected(namespace))
        }

        async fn get_virtual_machine(
            &self,
            namespace: &str,
            _name: &str,
        ) -> Result<VirtualMachine, LookupError> {
            Err(unexpected(namespace))
        }
    }

    #[tokio::test]
    async fn concurrent_backups_keep_their_own_listings() {
        // backup-1 lists before "b" exists; backup-2 lists after it was created
        let lookup = GatedLookup::new(vec![
            vec![claim("a", "uid-a")],
            vec![claim("a", "uid-a"), claim("b", "uid-b")],
        ]);
        let cache = ClaimUidCache::new();
        let cancel = CancellationToken::new();
        let scoped = ScopedLookup::new(&lookup, &cancel);

        let first = cache.uid_of("backup-1", "ns", "a", scoped);
        let second = async {
            tokio::task::yield_now().await;
            let uid = cache.uid_of("backup-2", "ns", "b", scoped).await;
            lookup.release.cancel();
            uid
        };
        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().as_deref(), Some("uid-a"));
        assert_eq!(second.unwrap().as_deref(), Some("uid-b"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        // Both listings are cached under their own backup
        assert_eq!(
            cache.uid_of("backup-2", "ns", "b", scoped).await.unwrap().as_deref(),
            Some("uid-b")
        );
        assert_eq!(cache.uid_of("backup-1", "ns", "b", scoped).await.unwrap(), None);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2, "no relisting");
    }

    #[tokio::test]
    async fn oldest_backup_is_evicted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockLookup::new();
        mock.expect_list_claims().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![claim("a", "uid-a")])
        });

        let cache = ClaimUidCache::new();
        let cancel = CancellationToken::new();
        let lookup = ScopedLookup::new(&mock, &cancel);

        for n in 0..=LIVE_SESSIONS {
            cache
                .uid_of(&format!("backup-{n}"), "ns", "a", lookup)
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), LIVE_SESSIONS + 1);

        cache.uid_of("backup-1", "ns", "a", lookup).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), LIVE_SESSIONS + 1, "still live");

        cache.uid_of("backup-0", "ns", "a", lookup).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), LIVE_SESSIONS + 2, "evicted");
    }

    #[tokio::test]
    async fn namespace_is_listed_once_per_backup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockLookup::new();
        mock.expect_list_claims().returning(move |selector, _| {
            assert!(selector.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![claim("a", "uid-a"), claim("b", "uid-b"), claim("c", "")])
        });

        let cache = ClaimUidCache::new();
        let cancel = CancellationToken::new();
        let lookup = ScopedLookup::new(&mock, &cancel);

        assert_eq!(
            cache.uid_of("backup-1", "ns", "a", lookup).await.unwrap().as_deref(),
            Some("uid-a")
        );
        assert_eq!(
            cache.uid_of("backup-1", "ns", "b", lookup).await.unwrap().as_deref(),
            Some("uid-b")
        );
        assert_eq!(cache.uid_of("backup-1", "ns", "c", lookup).await.unwrap(), None);
        assert_eq!(cache.uid_of("backup-1", "ns", "zz", lookup).await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.uid_of("backup-2", "ns", "a", lookup).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "new backup relists");
    }

    #[tokio::test]
    async fn failed_listing_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockLookup::new();
        mock.expect_list_claims().returning(move |_, namespace| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LookupError::NotFound {
                    kind: "Namespace".to_string(),
                    namespace: namespace.to_string(),
                    name: namespace.to_string(),
                })
            } else {
                Ok(vec![claim("a", "uid-a")])
            }
        });

        let cache = ClaimUidCache::new();
        let cancel = CancellationToken::new();
        let lookup = ScopedLookup::new(&mock, &cancel);

        assert!(cache.uid_of("b", "ns", "a", lookup).await.is_err());
        assert_eq!(
            cache.uid_of("b", "ns", "a", lookup).await.unwrap().as_deref(),
            Some("uid-a")
        );
    }
}
