//! Configuration store interface and in-memory implementation.
//!
//! The store abstracts the authoritative source of configuration objects.
//! Both the reconciliation trigger and the condition evaluator read through
//! it independently; neither caches what it reads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use vrc_reconcile::ObjectKey;

/// Point-in-time contents of a configuration object.
///
/// An empty map is a valid state and means "no toggles set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureConfiguration {
    data: BTreeMap<String, String>,
}

impl FeatureConfiguration {
    /// Look up a raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Returns true if no keys are set.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All key/value pairs.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }
}

impl<K, V> FromIterator<(K, V)> for FeatureConfiguration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Errors reading a configuration object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist (never created, or deleted).
    #[error("config map {0} not found")]
    NotFound(ObjectKey),

    /// The store could not be read; the caller may retry.
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if the object is absent rather than unreadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Read access to configuration objects.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the current state of the object identified by `key`.
    async fn get_config_map(&self, key: &ObjectKey) -> Result<FeatureConfiguration, StoreError>;
}

/// In-memory configuration store for testing and development.
#[derive(Default)]
pub struct InMemoryConfigStore {
    objects: RwLock<BTreeMap<ObjectKey, FeatureConfiguration>>,

    /// When set, every read fails with this message.
    unavailable: RwLock<Option<String>>,

    reads: AtomicU64,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an object.
    pub async fn apply(&self, key: ObjectKey, config: FeatureConfiguration) {
        debug!(key = %key, keys = config.data().len(), "Applying config map");
        self.objects.write().await.insert(key, config);
    }

    /// Delete an object. Returns true if it existed.
    pub async fn delete(&self, key: &ObjectKey) -> bool {
        self.objects.write().await.remove(key).is_some()
    }

    /// Make every subsequent read fail (`Some`) or succeed again (`None`).
    pub async fn set_unavailable(&self, reason: Option<String>) {
        *self.unavailable.write().await = reason;
    }

    /// Number of reads served so far, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_config_map(&self, key: &ObjectKey) -> Result<FeatureConfiguration, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.unavailable.read().await.as_ref() {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}
