use std::{
    collections::HashMap,
    error, fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::Mutex as AsyncMutex;

use crate::{
    sources::{CredentialCache, IssuerError, TokenIssuer},
    AccessToken, AccessTokenRef, AppId, AppIdRef, AppIdentity, TokenLifetimeConfig,
};

/// Hands out access tokens, refreshing them from the issuer when required
///
/// Reads are served from the [`CredentialCache`] without any locking. When the
/// cache misses, callers for the same application serialize on a per-application
/// guard and re-check the cache once they hold it, so a burst of concurrent
/// misses results in a single request to the issuer. Refreshes for different
/// applications do not wait on each other.
///
/// The guard is only ever held across the issuer round trip and the cache write.
pub struct AccessTokenManager {
    issuer: Box<dyn TokenIssuer>,
    cache: Box<dyn CredentialCache>,
    lifetime_config: TokenLifetimeConfig,
    guards: Mutex<HashMap<AppId, Arc<AsyncMutex<()>>>>,
}

impl AccessTokenManager {
    /// Constructs a new manager from an issuer and a cache
    pub fn new(
        issuer: impl TokenIssuer + 'static,
        cache: impl CredentialCache + 'static,
    ) -> Self {
        Self {
            issuer: Box::new(issuer),
            cache: Box::new(cache),
            lifetime_config: TokenLifetimeConfig::default(),
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how long newly issued tokens are kept in the cache
    pub fn with_lifetime_config(mut self, lifetime_config: TokenLifetimeConfig) -> Self {
        self.lifetime_config = lifetime_config;
        self
    }

    /// Gets a currently valid access token for `identity`
    ///
    /// Returns the cached token if there is one. Otherwise, requests a new token
    /// from the issuer and caches it, unless a concurrent caller already did so.
    pub async fn access_token(&self, identity: &AppIdentity) -> Result<AccessToken, IssuerError> {
        let app_id = identity.app_id();

        if let Some(token) = self.cached_token(app_id).await {
            tracing::trace!(app_id = %app_id, "using cached access token");
            return Ok(token);
        }

        let guard = self.refresh_guard(app_id);
        let _singleflight = guard.lock().await;

        if let Some(token) = self.cached_token(app_id).await {
            tracing::debug!(app_id = %app_id, "access token was refreshed by a concurrent caller");
            return Ok(token);
        }

        self.refresh(identity).await
    }

    /// Requests a new access token from the issuer, regardless of what is cached
    ///
    /// Concurrent calls for the same application are serialized.
    pub async fn force_refresh(&self, identity: &AppIdentity) -> Result<AccessToken, IssuerError> {
        let guard = self.refresh_guard(identity.app_id());
        let _singleflight = guard.lock().await;

        self.refresh(identity).await
    }

    /// Replaces an access token that the platform has rejected
    ///
    /// Behaves like [`force_refresh()`][Self::force_refresh()], except that when the
    /// cache already holds a token other than `rejected` once the guard is held,
    /// that token was stored by a refresh that completed while this caller waited,
    /// and it is returned without contacting the issuer again.
    pub async fn refresh_rejected(
        &self,
        identity: &AppIdentity,
        rejected: &AccessTokenRef,
    ) -> Result<AccessToken, IssuerError> {
        let app_id = identity.app_id();
        let guard = self.refresh_guard(app_id);
        let _singleflight = guard.lock().await;

        match self.cached_token(app_id).await {
            Some(token) if token.as_str() != rejected.as_str() => {
                tracing::debug!(app_id = %app_id, "rejected access token was already replaced");
                Ok(token)
            }
            _ => self.refresh(identity).await,
        }
    }

    async fn cached_token(&self, app_id: &AppIdRef) -> Option<AccessToken> {
        match self.cache.fetch(app_id).await {
            Ok(token) => token.filter(|t| !t.as_str().is_empty()),
            Err(error) => {
                tracing::warn!(
                    app_id = %app_id,
                    error = (&*error as &dyn error::Error),
                    "credential cache returned error, treating as a miss"
                );
                None
            }
        }
    }

    /// Must only be called while holding the guard for `identity`
    async fn refresh(&self, identity: &AppIdentity) -> Result<AccessToken, IssuerError> {
        let app_id = identity.app_id();
        let issued = self.issuer.issue_token(identity).await?;
        let ttl = self.lifetime_config.cache_ttl(issued.expires_in());

        if let Err(error) = self.cache.save(app_id, issued.access_token(), ttl).await {
            tracing::warn!(
                app_id = %app_id,
                error = (&*error as &dyn error::Error),
                "unable to push new access token to cache"
            );
        }

        tracing::info!(
            app_id = %app_id,
            expires_in = issued.expires_in().0,
            ttl = ttl.0,
            "refreshed access token"
        );

        Ok(issued.into_access_token())
    }

    fn refresh_guard(&self, app_id: &AppIdRef) -> Arc<AsyncMutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(guard) = guards.get(app_id) {
            return Arc::clone(guard);
        }

        Arc::clone(guards.entry(app_id.to_owned()).or_default())
    }
}

impl fmt::Debug for AccessTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AccessTokenManager")
            .field("lifetime_config", &self.lifetime_config)
            .field("applications", &guards.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use offiaccount_clock::DurationSecs;
    use tokio::sync::Barrier;

    use super::*;
    use crate::{sources::InMemoryCredentialCache, IssuedToken};

    type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

    /// Issues `T1`, `T2`, … and counts how often it was asked
    #[derive(Default)]
    struct CountingIssuer {
        calls: AtomicUsize,
        delay: Duration,
        barrier: Option<Barrier>,
        fail_first: usize,
    }

    impl CountingIssuer {
        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                ..Self::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenIssuer for CountingIssuer {
        async fn issue_token(&self, identity: &AppIdentity) -> Result<IssuedToken, IssuerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            tokio::time::sleep(self.delay).await;

            if n <= self.fail_first {
                return Err(IssuerError::EmptyToken {
                    errcode: 40013,
                    errmsg: "invalid appid".into(),
                });
            }

            Ok(IssuedToken::new(
                format!("{}-T{}", identity.app_id(), n),
                DurationSecs(7200),
            ))
        }
    }

    /// Remembers the TTL of every save
    #[derive(Default)]
    struct RecordingCache {
        inner: InMemoryCredentialCache,
        ttls: Mutex<Vec<DurationSecs>>,
    }

    #[async_trait]
    impl CredentialCache for RecordingCache {
        async fn fetch(&self, key: &AppIdRef) -> Result<Option<AccessToken>, BoxError> {
            self.inner.fetch(key).await
        }

        async fn save(
            &self,
            key: &AppIdRef,
            token: &AccessTokenRef,
            ttl: DurationSecs,
        ) -> Result<(), BoxError> {
            self.ttls.lock().unwrap().push(ttl);
            self.inner.save(key, token, ttl).await
        }
    }

    /// A cache whose backing store is unreachable
    struct BrokenCache;

    #[async_trait]
    impl CredentialCache for BrokenCache {
        async fn fetch(&self, _: &AppIdRef) -> Result<Option<AccessToken>, BoxError> {
            Err("connection refused".into())
        }

        async fn save(&self, _: &AppIdRef, _: &AccessTokenRef, _: DurationSecs) -> Result<(), BoxError> {
            Err("connection refused".into())
        }
    }

    fn identity() -> AppIdentity {
        AppIdentity::new("wx-app", "s3cr3t")
    }

    async fn cached(cache: &impl CredentialCache, identity: &AppIdentity) -> Option<String> {
        cache
            .fetch(identity.app_id())
            .await
            .unwrap()
            .map(|t| t.as_str().to_owned())
    }

    #[tokio::test]
    async fn cache_hit_never_contacts_the_issuer() {
        let issuer = Arc::new(CountingIssuer::default());
        let cache = Arc::new(InMemoryCredentialCache::new());
        cache
            .save(
                identity().app_id(),
                AccessTokenRef::from_static("cached"),
                DurationSecs(600),
            )
            .await
            .unwrap();
        let manager = AccessTokenManager::new(issuer.clone(), cache);

        let token = manager.access_token(&identity()).await.unwrap();

        assert_eq!(token.as_str(), "cached");
        assert_eq!(issuer.calls(), 0);
    }

    #[tokio::test]
    async fn cache_miss_refreshes_and_stores_shrunken_ttl() {
        let issuer = Arc::new(CountingIssuer::default());
        let cache = Arc::new(RecordingCache::default());
        let manager = AccessTokenManager::new(issuer.clone(), cache.clone());

        let token = manager.access_token(&identity()).await.unwrap();

        assert_eq!(token.as_str(), "wx-app-T1");
        assert_eq!(issuer.calls(), 1);
        assert_eq!(*cache.ttls.lock().unwrap(), vec![DurationSecs(6480)]);
        assert_eq!(cached(&cache, &identity()).await.as_deref(), Some("wx-app-T1"));

        let again = manager.access_token(&identity()).await.unwrap();
        assert_eq!(again.as_str(), "wx-app-T1");
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn custom_lifetime_config_is_applied() {
        let cache = Arc::new(RecordingCache::default());
        let manager = AccessTokenManager::new(CountingIssuer::default(), cache.clone())
            .with_lifetime_config(TokenLifetimeConfig::new(0.5));

        manager.access_token(&identity()).await.unwrap();

        assert_eq!(*cache.ttls.lock().unwrap(), vec![DurationSecs(3600)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_a_single_refresh() {
        let issuer = CountingIssuer::slow(Duration::from_millis(50));
        let manager = Arc::new(AccessTokenManager::new(
            issuer.clone(),
            InMemoryCredentialCache::new(),
        ));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.access_token(&identity()).await })
            })
            .collect();

        for task in tasks {
            let token = task.await.unwrap().unwrap();
            assert_eq!(token.as_str(), "wx-app-T1");
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_applications_refresh_in_parallel() {
        // Both refreshes must be in flight at once to get past the barrier
        let issuer = Arc::new(CountingIssuer {
            barrier: Some(Barrier::new(2)),
            ..CountingIssuer::default()
        });
        let manager = Arc::new(AccessTokenManager::new(
            issuer.clone(),
            InMemoryCredentialCache::new(),
        ));

        let first = AppIdentity::new("first", "s1");
        let second = AppIdentity::new("second", "s2");

        let both = async {
            tokio::join!(manager.access_token(&first), manager.access_token(&second))
        };
        let (a, b) = tokio::time::timeout(Duration::from_secs(5), both)
            .await
            .expect("refreshes of different applications must not block each other");

        assert!(a.unwrap().as_str().starts_with("first-"));
        assert!(b.unwrap().as_str().starts_with("second-"));
        assert_eq!(issuer.calls(), 2);
    }

    mod when_forcing_a_refresh {
        use super::*;

        #[tokio::test]
        async fn fresh_cached_token_is_replaced() {
            let issuer = Arc::new(CountingIssuer::default());
            let cache = Arc::new(InMemoryCredentialCache::new());
            cache
                .save(
                    identity().app_id(),
                    AccessTokenRef::from_static("still-fresh"),
                    DurationSecs(7000),
                )
                .await
                .unwrap();
            let manager = AccessTokenManager::new(issuer.clone(), cache.clone());

            let token = manager.force_refresh(&identity()).await.unwrap();

            assert_eq!(token.as_str(), "wx-app-T1");
            assert_eq!(issuer.calls(), 1);
            assert_eq!(cached(&cache, &identity()).await.as_deref(), Some("wx-app-T1"));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_rejections_of_one_token_refresh_once() {
            let issuer = CountingIssuer::slow(Duration::from_millis(50));
            let cache = Arc::new(InMemoryCredentialCache::new());
            cache
                .save(
                    identity().app_id(),
                    AccessTokenRef::from_static("rejected"),
                    DurationSecs(7000),
                )
                .await
                .unwrap();
            let manager = Arc::new(AccessTokenManager::new(issuer.clone(), cache));

            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        manager
                            .refresh_rejected(&identity(), AccessTokenRef::from_static("rejected"))
                            .await
                    })
                })
                .collect();

            for task in tasks {
                assert_eq!(task.await.unwrap().unwrap().as_str(), "wx-app-T1");
            }
            assert_eq!(issuer.calls(), 1);
        }
    }

    mod when_the_issuer_fails {
        use super::*;

        #[tokio::test]
        async fn error_propagates_and_the_guard_is_released() {
            let issuer = Arc::new(CountingIssuer {
                fail_first: 1,
                ..CountingIssuer::default()
            });
            let manager = AccessTokenManager::new(issuer.clone(), InMemoryCredentialCache::new());

            let err = manager.access_token(&identity()).await.unwrap_err();
            assert!(matches!(err, IssuerError::EmptyToken { errcode: 40013, .. }));

            let token = tokio::time::timeout(Duration::from_secs(5), manager.access_token(&identity()))
                .await
                .expect("guard must be released after a failed refresh")
                .unwrap();
            assert_eq!(token.as_str(), "wx-app-T2");
        }

        #[tokio::test]
        async fn nothing_is_cached() {
            let cache = Arc::new(InMemoryCredentialCache::new());
            let issuer = CountingIssuer {
                fail_first: 1,
                ..CountingIssuer::default()
            };
            let manager = AccessTokenManager::new(issuer, cache.clone());

            manager.force_refresh(&identity()).await.unwrap_err();

            assert_eq!(cached(&cache, &identity()).await, None);
        }
    }

    mod when_the_cache_fails {
        use super::*;

        #[tokio::test]
        async fn fetch_errors_are_treated_as_misses_and_save_errors_are_ignored() {
            let issuer = Arc::new(CountingIssuer::default());
            let manager = AccessTokenManager::new(issuer.clone(), BrokenCache);

            let token = manager.access_token(&identity()).await.unwrap();

            assert_eq!(token.as_str(), "wx-app-T1");
            assert_eq!(issuer.calls(), 1);
        }
    }
}
