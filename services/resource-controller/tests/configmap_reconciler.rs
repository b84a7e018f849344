//! Integration tests for config map reconciliation.
//!
//! Uses InMemoryConfigStore and MockNodeManager in place of the cluster API
//! and the node manager.

use std::sync::Arc;

use rstest::rstest;
use vrc_condition::{
    ConditionMetrics, Conditions, ControllerConditions, FeatureConfiguration,
    InMemoryConfigStore, ReadinessFlag, DEFAULT_CONFIG_MAP_NAMESPACE, ENABLE_WINDOWS_IPAM_KEY,
    VPC_CNI_CONFIG_MAP_NAME,
};
use vrc_reconcile::{ObjectKey, ReconcileResult, Reconciler};
use vrc_resource_controller::{ConfigMapReconciler, ControllerError, MockNodeManager};

fn config_map_key() -> ObjectKey {
    ObjectKey::new(DEFAULT_CONFIG_MAP_NAMESPACE, VPC_CNI_CONFIG_MAP_NAME)
}

fn windows_ipam(value: &str) -> FeatureConfiguration {
    [(ENABLE_WINDOWS_IPAM_KEY, value)].into_iter().collect()
}

struct Fixture {
    store: Arc<InMemoryConfigStore>,
    node_manager: Arc<MockNodeManager>,
    reconciler: ConfigMapReconciler,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryConfigStore::new());
    let node_manager = Arc::new(MockNodeManager::new());
    let reconciler = ConfigMapReconciler::new(store.clone(), node_manager.clone());

    Fixture {
        store,
        node_manager,
        reconciler,
    }
}

#[tokio::test]
async fn test_reconcile_updates_nodes() {
    let f = fixture();
    f.store.apply(config_map_key(), windows_ipam("true")).await;

    let result = f.reconciler.reconcile(&config_map_key()).await.unwrap();

    assert_eq!(result, ReconcileResult::done());
    assert_eq!(f.node_manager.sync_count(), 1);
}

#[tokio::test]
async fn test_reconcile_deleted_config_map_still_updates_nodes() {
    let f = fixture();

    let result = f.reconciler.reconcile(&config_map_key()).await.unwrap();

    assert_eq!(result, ReconcileResult::done());
    assert_eq!(f.node_manager.sync_count(), 1);
}

#[tokio::test]
async fn test_reconcile_empty_config_map_updates_nodes() {
    let f = fixture();
    f.store
        .apply(config_map_key(), FeatureConfiguration::default())
        .await;

    f.reconciler.reconcile(&config_map_key()).await.unwrap();

    assert_eq!(f.node_manager.sync_count(), 1);
}

#[rstest]
#[case("aws-node")]
#[case("kube-proxy")]
#[case("amazon-vpc-cni-extra")]
#[case("")]
#[tokio::test]
async fn test_reconcile_ignores_other_config_maps(#[case] name: &str) {
    let f = fixture();
    let key = ObjectKey::new(DEFAULT_CONFIG_MAP_NAMESPACE, name);
    f.store.apply(key.clone(), windows_ipam("true")).await;

    let result = f.reconciler.reconcile(&key).await.unwrap();

    assert_eq!(result, ReconcileResult::done());
    assert_eq!(f.node_manager.sync_count(), 0);
    assert_eq!(f.store.read_count(), 0);
}

#[tokio::test]
async fn test_reconcile_node_sync_error() {
    let f = fixture();
    f.store.apply(config_map_key(), windows_ipam("true")).await;
    f.node_manager.set_failing(true);

    let err = f.reconciler.reconcile(&config_map_key()).await.unwrap_err();

    assert!(matches!(err, ControllerError::NodeSync(_)));
    assert_eq!(err.reason_code(), "node_sync_failed");
    assert_eq!(f.node_manager.sync_count(), 1);
}

#[tokio::test]
async fn test_reconcile_fetch_error_does_not_update_nodes() {
    let f = fixture();
    f.store
        .set_unavailable(Some("connection reset".to_string()))
        .await;

    let err = f.reconciler.reconcile(&config_map_key()).await.unwrap_err();

    assert!(matches!(err, ControllerError::Fetch { .. }));
    assert_eq!(err.reason_code(), "fetch_failed");
    assert_eq!(f.node_manager.sync_count(), 0);
}

#[tokio::test]
async fn test_reconcile_is_repeatable() {
    let f = fixture();
    f.store.apply(config_map_key(), windows_ipam("false")).await;

    for _ in 0..3 {
        let result = f.reconciler.reconcile(&config_map_key()).await.unwrap();
        assert_eq!(result, ReconcileResult::done());
    }

    assert_eq!(f.node_manager.sync_count(), 3);
}

#[tokio::test]
async fn test_reconcile_concurrent_invocations() {
    let f = fixture();
    f.store.apply(config_map_key(), windows_ipam("true")).await;
    let reconciler = Arc::new(f.reconciler);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move { reconciler.reconcile(&config_map_key()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(f.node_manager.sync_count(), 8);
}

/// Deleting the config map disables the feature on the conditions path while
/// the reconcile path still resynchronizes nodes.
#[tokio::test]
async fn test_deleted_config_map_disables_feature_and_syncs() {
    let f = fixture();
    let conditions = ControllerConditions::with_metrics(
        ReadinessFlag::ready(),
        f.store.clone(),
        DEFAULT_CONFIG_MAP_NAMESPACE,
        Arc::new(ConditionMetrics::new()),
    );

    f.store.apply(config_map_key(), windows_ipam("true")).await;
    f.reconciler.reconcile(&config_map_key()).await.unwrap();
    assert!(conditions.is_windows_ipam_enabled().await);

    f.store.delete(&config_map_key()).await;
    f.reconciler.reconcile(&config_map_key()).await.unwrap();
    assert!(!conditions.is_windows_ipam_enabled().await);

    assert_eq!(f.node_manager.sync_count(), 2);
}
