//! Facilities for caching and renewing platform access tokens
//!
//! Every call to the platform's HTTP API must carry a short-lived access token
//! minted by a separate issuing endpoint. The issuer limits how often tokens may
//! be requested, and issuing a new token can invalidate the previous one, so
//! refreshes have to be coordinated between all of the callers that share an
//! application identity.
//!
//! The [`AccessTokenManager`] does that coordination. It reads tokens from a
//! [`CredentialCache`][sources::CredentialCache] without locking, and when the
//! cache comes up empty it lets exactly one caller per application go to the
//! [`TokenIssuer`][sources::TokenIssuer] while the rest wait and then reuse the
//! token that caller stored. Tokens are cached for a fraction of their reported
//! lifetime (see [`TokenLifetimeConfig`]) so that a cached token always expires
//! before the issuer stops honoring it.
//!
//! ```
//! use std::sync::Arc;
//!
//! use offiaccount_tokens::{
//!     sources::{InMemoryCredentialCache, IssuerClient, DEFAULT_BASE_URL},
//!     AccessTokenManager, AppIdentity, TokenLifetimeConfig,
//! };
//! use reqwest_middleware::ClientBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let http = ClientBuilder::new(reqwest::Client::new()).build();
//! let issuer = IssuerClient::new(http, &reqwest::Url::parse(DEFAULT_BASE_URL)?)?;
//!
//! let manager = Arc::new(
//!     AccessTokenManager::new(issuer, InMemoryCredentialCache::new())
//!         .with_lifetime_config(TokenLifetimeConfig::new(0.9)),
//! );
//!
//! let identity = AppIdentity::new("wx0123456789abcdef", "app-secret");
//! # let _ = (manager, identity);
//! # /* Commented out due to this trying to interact with the world.
//! let token = manager.access_token(&identity).await?;
//! # */
//! # Ok(())
//! # }
//! ```
//!
//! The cache is a trait object, so the in-memory cache can be replaced by a
//! store shared between processes without touching the refresh logic.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod endpoint;
mod manager;
pub mod sources;
mod tokens;

pub use braids::*;
pub use endpoint::{resolve_endpoint, EndpointError};
pub use manager::AccessTokenManager;
pub use tokens::{AppIdentity, IssuedToken, TokenLifetimeConfig};
