//! Resolves identities to shared token buckets.
//!
//! Lookup order for a rate: shared cache, then the profile store, then the service default
//! (which is persisted and cached on first use). Buckets themselves are process-local and
//! live for as long as the registry does; every call for the same identity gets the same
//! `Arc<TokenBucket>`, so token state is shared across concurrent requests.

use crate::cache::SharedCache;
use crate::clock::Clock;
use crate::model::RateProfile;
use crate::rate_limit::{ProfileStore, RateLimitError, TokenBucket, REFILL_INTERVAL};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Registry of per-identity buckets for one service.
#[derive(Debug)]
pub struct RateLimitRegistry {
    service: String,
    default_rate: NonZeroU32,
    profiles: Arc<dyn ProfileStore>,
    cache: Arc<dyn SharedCache<String, RateProfile>>,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimitRegistry {
    /// Empty registry for `service`; `default_rate` applies to identities without a profile.
    pub fn new(
        service: impl Into<String>,
        default_rate: NonZeroU32,
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn SharedCache<String, RateProfile>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: service.into(),
            default_rate,
            profiles,
            cache,
            buckets: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Name of the service this registry limits, used in log fields.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Tokens per minute given to identities that have no stored profile.
    pub fn default_rate(&self) -> NonZeroU32 {
        self.default_rate
    }

    /// Return the bucket for `identity`, creating it from the identity's profile on first use.
    ///
    /// Two first-time callers racing on one identity may both load the profile, but only
    /// the first bucket inserted is ever handed out.
    ///
    /// # Errors
    /// [`RateLimitError::Store`] if the profile store fails (including the default-profile
    /// write); [`RateLimitError::InvalidRate`] if the stored rate is zero.
    pub async fn resolve(&self, identity: &str) -> Result<Arc<TokenBucket>, RateLimitError> {
        if let Some(bucket) = self.existing(identity) {
            return Ok(bucket);
        }

        let profile = self.load_profile(identity).await?;
        let bucket = TokenBucket::from_profile(&profile, self.clock.clone()).ok_or_else(|| {
            RateLimitError::InvalidRate { identity: identity.to_string(), rate: profile.tokens_per_minute }
        })?;

        let bucket = {
            let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
            buckets.entry(identity.to_string()).or_insert_with(|| Arc::new(bucket)).clone()
        };
        debug!(service = %self.service, identity, capacity = bucket.capacity(), "token bucket resolved");
        Ok(bucket)
    }

    /// Administrative rate change: persist, refresh the cache, and retune a live bucket.
    ///
    /// If no bucket exists yet, one is installed at the new rate, so a first-time
    /// [`resolve`](Self::resolve) that loaded the old profile still hands out the new rate.
    pub async fn update_rate(
        &self,
        identity: &str,
        tokens_per_minute: u32,
    ) -> Result<(), RateLimitError> {
        let rate = NonZeroU32::new(tokens_per_minute).ok_or_else(|| RateLimitError::InvalidRate {
            identity: identity.to_string(),
            rate: tokens_per_minute,
        })?;
        let profile = RateProfile::new(identity, tokens_per_minute);
        self.profiles.save_rate_profile(profile.clone()).await?;
        self.cache_profile(profile).await;

        {
            let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
            match buckets.get(identity) {
                Some(bucket) => bucket.reconfigure(rate),
                None => {
                    let bucket = TokenBucket::new(rate, REFILL_INTERVAL, self.clock.clone());
                    buckets.insert(identity.to_string(), Arc::new(bucket));
                }
            }
        }
        info!(service = %self.service, identity, tokens_per_minute, "rate profile updated");
        Ok(())
    }

    async fn load_profile(&self, identity: &str) -> Result<RateProfile, RateLimitError> {
        let key = identity.to_string();
        match self.cache.get(&key).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) => {
                warn!(service = %self.service, identity, error = %e, "profile cache read failed; falling back to store")
            }
        }

        let profile = match self.profiles.find_rate_profile(identity).await? {
            Some(profile) => profile,
            None => {
                let profile = RateProfile::new(identity, self.default_rate.get());
                self.profiles.save_rate_profile(profile.clone()).await?;
                info!(
                    service = %self.service,
                    identity,
                    tokens_per_minute = profile.tokens_per_minute,
                    "no rate profile found; default profile created"
                );
                profile
            }
        };
        self.cache_profile(profile.clone()).await;
        Ok(profile)
    }

    async fn cache_profile(&self, profile: RateProfile) {
        let identity = profile.identity.clone();
        if let Err(e) = self.cache.put(identity.clone(), profile).await {
            warn!(service = %self.service, identity = %identity, error = %e, "profile cache write failed");
        }
    }

    fn existing(&self, identity: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.read().unwrap_or_else(|e| e.into_inner()).get(identity).cloned()
    }
}
