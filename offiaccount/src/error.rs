//! Errors returned by the platform client

use offiaccount_tokens::{sources::IssuerError, EndpointError};
use thiserror::Error;

/// An error while calling the platform API
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent, or timed out
    #[error("error sending request to platform")]
    Transport(#[source] reqwest_middleware::Error),
    /// The platform answered with a non-success status
    #[error("platform returned status {status}")]
    Status {
        /// The transport status
        status: reqwest::StatusCode,
    },
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),
    /// The response body is not a well-formed JSON document
    #[error("error parsing platform response: {body}")]
    Parse {
        /// The underlying parse error
        source: serde_json::Error,
        /// The body that failed to parse
        body: String,
    },
    /// An access token could not be obtained from the issuer
    #[error("unable to refresh access token")]
    Refresh(#[from] IssuerError),
    /// The platform reported an error of its own
    ///
    /// Displays as the raw response body.
    #[error("{body}")]
    Application {
        /// The platform's error code
        errcode: i64,
        /// The platform's error message
        errmsg: String,
        /// The raw response body
        body: String,
    },
    /// The platform kept rejecting the access token, even after a refresh
    #[error("access token rejected by platform (errcode {errcode}): {errmsg}")]
    CredentialInvalid {
        /// The platform's error code
        errcode: i64,
        /// The platform's error message
        errmsg: String,
    },
    /// The request path could not be placed under the base URL
    #[error("invalid request path")]
    InvalidPath(#[from] EndpointError),
}

impl Error {
    /// Whether the failure happened in transport rather than being reported by the platform
    ///
    /// Transport failures are usually worth retrying at a higher level, with backoff.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Status { .. } | Self::BodyRead(_) => true,
            Self::Refresh(err) => err.is_transport(),
            _ => false,
        }
    }

    /// The platform or issuer error code, if one was reported
    pub fn errcode(&self) -> Option<i64> {
        match self {
            Self::Application { errcode, .. } | Self::CredentialInvalid { errcode, .. } => {
                Some(*errcode)
            }
            Self::Refresh(IssuerError::EmptyToken { errcode, .. }) => Some(*errcode),
            _ => None,
        }
    }
}
