//! A client for the official account platform API
//!
//! Every call to the platform must carry an access token as the
//! `access_token` query parameter. The [`Client`] obtains that token from a
//! shared [`AccessTokenManager`][offiaccount_tokens::AccessTokenManager],
//! attaches it to each outgoing request, and inspects the response body for
//! the platform's `errcode`/`errmsg` envelope.
//!
//! When the platform reports that the token is invalid or expired, the client
//! asks the manager for a new token and sends the same request again. The
//! retry happens at most once per call; a second rejection is returned to the
//! caller as [`Error::CredentialInvalid`].
//!
//! ```
//! use offiaccount::{Client, ClientConfig};
//!
//! # fn main() -> Result<(), offiaccount::ConfigError> {
//! let config = ClientConfig::new("wx0123456789abcdef", "app-secret");
//! let client = Client::from_config(&config)?;
//! # let _ = client;
//! # /* Commented out due to this trying to interact with the world.
//! let menu = client.http_get("/cgi-bin/get_current_selfmenu_info").await?;
//! # */
//! # Ok(())
//! # }
//! ```
//!
//! Clients for several applications may share a single manager and its
//! cache. Refreshes are coordinated per application, so callers acting for
//! one application never wait on another application's refresh.
//!
//! ```
//! use std::sync::Arc;
//!
//! use offiaccount::{
//!     offiaccount_tokens::{
//!         sources::{InMemoryCredentialCache, IssuerClient, DEFAULT_BASE_URL},
//!         AccessTokenManager, AppIdentity,
//!     },
//!     Client,
//! };
//! use reqwest_middleware::ClientBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let http = ClientBuilder::new(reqwest::Client::new()).build();
//! let issuer = IssuerClient::new(http.clone(), &reqwest::Url::parse(DEFAULT_BASE_URL)?)?;
//! let manager = Arc::new(AccessTokenManager::new(issuer, InMemoryCredentialCache::new()));
//!
//! let first = Client::new(
//!     AppIdentity::new("wx0123456789abcdef", "first-secret"),
//!     manager.clone(),
//!     http.clone(),
//! );
//! let second = Client::new(
//!     AppIdentity::new("wxfedcba9876543210", "second-secret"),
//!     manager,
//!     http,
//! );
//! # let _ = (first, second);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod apis;
mod client;
pub mod config;
mod error;
pub mod filter;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::Error;
pub use filter::{ErrorEnvelope, Outcome, ResponseFilter};
pub use offiaccount_tokens;
