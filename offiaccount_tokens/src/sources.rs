//! Token sources and caches

use crate::{AccessToken, AccessTokenRef, AppIdRef, AppIdentity, IssuedToken};
use async_trait::async_trait;
use offiaccount_clock::DurationSecs;
use std::{error, sync::Arc};

pub mod in_memory;
pub mod issuer;

pub use in_memory::InMemoryCredentialCache;
pub use issuer::{IssuerClient, IssuerError, DEFAULT_BASE_URL};

/// A source able to mint new access tokens for an application
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Performs a single exchange with the issuer to obtain a fresh token
    async fn issue_token(&self, identity: &AppIdentity) -> Result<IssuedToken, IssuerError>;
}

/// A time-to-live aware store for access tokens, keyed by application ID
///
/// Implementations may be shared between processes. They must be safe to
/// read and write concurrently.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Looks up the token stored for `key`
    ///
    /// A missing or expired entry is `Ok(None)`, not an error.
    async fn fetch(
        &self,
        key: &AppIdRef,
    ) -> Result<Option<AccessToken>, Box<dyn error::Error + Send + Sync + 'static>>;

    /// Stores `token` for `key`
    ///
    /// Once `ttl` has elapsed, subsequent calls to [`fetch`][Self::fetch] must miss.
    async fn save(
        &self,
        key: &AppIdRef,
        token: &AccessTokenRef,
        ttl: DurationSecs,
    ) -> Result<(), Box<dyn error::Error + Send + Sync + 'static>>;
}

#[async_trait]
impl<T: TokenIssuer + ?Sized> TokenIssuer for Arc<T> {
    async fn issue_token(&self, identity: &AppIdentity) -> Result<IssuedToken, IssuerError> {
        (**self).issue_token(identity).await
    }
}

#[async_trait]
impl<T: CredentialCache + ?Sized> CredentialCache for Arc<T> {
    async fn fetch(
        &self,
        key: &AppIdRef,
    ) -> Result<Option<AccessToken>, Box<dyn error::Error + Send + Sync + 'static>> {
        (**self).fetch(key).await
    }

    async fn save(
        &self,
        key: &AppIdRef,
        token: &AccessTokenRef,
        ttl: DurationSecs,
    ) -> Result<(), Box<dyn error::Error + Send + Sync + 'static>> {
        (**self).save(key, token, ttl).await
    }
}
