use crate::error::StoreError;
use crate::model::RateProfile;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Persistent storage for rate profiles, keyed by identity.
///
/// Implementations may be local or backed by a database shared across processes.
#[async_trait]
pub trait ProfileStore: Send + Sync + std::fmt::Debug {
    /// Fetch the profile for `identity`, if one was ever saved.
    async fn find_rate_profile(&self, identity: &str) -> Result<Option<RateProfile>, StoreError>;

    /// Insert or overwrite the profile for `profile.identity`.
    async fn save_rate_profile(&self, profile: RateProfile) -> Result<(), StoreError>;
}

/// Simple in-memory profile store.
#[derive(Default, Clone, Debug)]
pub struct InMemoryProfileStore {
    data: Arc<RwLock<HashMap<String, RateProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed profiles, e.g. tenants with a negotiated rate.
    pub fn with_profiles(profiles: impl IntoIterator<Item = RateProfile>) -> Self {
        let data = profiles.into_iter().map(|p| (p.identity.clone(), p)).collect();
        Self { data: Arc::new(RwLock::new(data)) }
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_rate_profile(&self, identity: &str) -> Result<Option<RateProfile>, StoreError> {
        let guard = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(identity).cloned())
    }

    async fn save_rate_profile(&self, profile: RateProfile) -> Result<(), StoreError> {
        let mut guard = self.data.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(profile.identity.clone(), profile);
        Ok(())
    }
}
