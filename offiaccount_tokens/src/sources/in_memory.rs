//! An in-memory credential cache

use crate::sources::CredentialCache;
use crate::{AccessToken, AccessTokenRef, AppId, AppIdRef};
use async_trait::async_trait;
use offiaccount_clock::{Clock, DurationSecs, System, UnixTime};
use std::{collections::HashMap, error};
use tokio::sync::RwLock;

#[derive(Debug)]
struct Entry {
    token: AccessToken,
    expiry: UnixTime,
}

/// An in-memory credential cache
///
/// Entries are kept per process; use a shared store behind [`CredentialCache`]
/// when several instances should reuse each other's tokens.
#[derive(Debug, Default)]
pub struct InMemoryCredentialCache<C = System> {
    entries: RwLock<HashMap<AppId, Entry>>,
    clock: C,
}

impl InMemoryCredentialCache<System> {
    /// Constructs a new, empty in-memory cache using the system clock
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: System,
        }
    }
}

impl<C> InMemoryCredentialCache<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> InMemoryCredentialCache<D> {
        InMemoryCredentialCache {
            entries: self.entries,
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> CredentialCache for InMemoryCredentialCache<C> {
    async fn fetch(
        &self,
        key: &AppIdRef,
    ) -> Result<Option<AccessToken>, Box<dyn error::Error + Send + Sync + 'static>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        Ok(entries
            .get(key)
            .filter(|entry| now < entry.expiry)
            .map(|entry| entry.token.clone()))
    }

    async fn save(
        &self,
        key: &AppIdRef,
        token: &AccessTokenRef,
        ttl: DurationSecs,
    ) -> Result<(), Box<dyn error::Error + Send + Sync + 'static>> {
        let expiry = self.clock.now() + ttl;
        let mut entries = self.entries.write().await;

        entries.insert(
            key.to_owned(),
            Entry {
                token: token.to_owned(),
                expiry,
            },
        );
        Ok(())
    }
}
