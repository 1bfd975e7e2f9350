use offiaccount_clock::DurationSecs;
use serde::{Deserialize, Serialize};

use super::{AccessToken, AccessTokenRef, AppId, AppIdRef, AppSecret, AppSecretRef};

/// The identity of an application as known to the token issuer
///
/// Both halves are fixed at construction; nothing in this crate mutates them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppIdentity {
    app_id: AppId,
    secret: AppSecret,
}

impl AppIdentity {
    /// Constructs a new application identity
    pub fn new(app_id: impl Into<AppId>, secret: impl Into<AppSecret>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
        }
    }

    /// The public application ID, also used as the credential cache key
    #[inline]
    pub fn app_id(&self) -> &AppIdRef {
        &self.app_id
    }

    /// The application secret
    #[inline]
    pub fn secret(&self) -> &AppSecretRef {
        &self.secret
    }
}

/// A freshly minted access token, as reported by the issuer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuedToken {
    access_token: AccessToken,
    expires_in: DurationSecs,
}

impl IssuedToken {
    /// Constructs an issued token from its parts
    pub fn new(access_token: impl Into<AccessToken>, expires_in: DurationSecs) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the lifetime the issuer reported for the token
    #[inline]
    pub fn expires_in(&self) -> DurationSecs {
        self.expires_in
    }

    /// Takes ownership of the access token
    #[inline]
    pub fn into_access_token(self) -> AccessToken {
        self.access_token
    }
}

/// Configuration for how long an issued token may be served from the cache
#[derive(Clone, Copy, Debug)]
pub struct TokenLifetimeConfig {
    ttl_ratio: f64,
}

impl Default for TokenLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Caches a token for 90% of the lifetime reported by the issuer.
    fn default() -> Self {
        Self { ttl_ratio: 0.9 }
    }
}

impl TokenLifetimeConfig {
    /// Constructs a new lifetime configuration
    ///
    /// A token will be cached for `ttl_ratio` (a ratio of the issuer's reported lifetime),
    /// rounded down to whole seconds. Ratios outside of `0.0..=1.0` are clamped into it.
    pub fn new(ttl_ratio: f64) -> Self {
        let ttl_ratio = if ttl_ratio.is_nan() {
            0.
        } else {
            ttl_ratio.clamp(0., 1.)
        };
        Self { ttl_ratio }
    }

    /// The configured ratio
    #[inline]
    pub fn ttl_ratio(&self) -> f64 {
        self.ttl_ratio
    }

    /// The time-to-live to use when caching a token with the given issuer lifetime
    #[inline]
    pub fn cache_ttl(&self, expires_in: DurationSecs) -> DurationSecs {
        expires_in * self.ttl_ratio
    }
}
