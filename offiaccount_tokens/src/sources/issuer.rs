//! A token source backed by the platform's token-issuing endpoint

use async_trait::async_trait;
use offiaccount_clock::DurationSecs;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

use super::TokenIssuer;
use crate::{resolve_endpoint, AppIdentity, EndpointError, IssuedToken};

pub mod dto;

/// The default host for both the issuer and the platform API
pub const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";

const TOKEN_PATH: &str = "/cgi-bin/token";

/// Requests tokens from the issuer using the `client_credential` grant
#[derive(Clone, Debug)]
pub struct IssuerClient {
    client: ClientWithMiddleware,
    token_url: Url,
}

impl IssuerClient {
    /// Constructs a new issuer client
    ///
    /// The token endpoint is placed under `base_url`, keeping any path prefix.
    pub fn new(client: ClientWithMiddleware, base_url: &Url) -> Result<Self, EndpointError> {
        Ok(Self {
            client,
            token_url: resolve_endpoint(base_url, TOKEN_PATH)?,
        })
    }

    /// The URL tokens are requested from
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenIssuer for IssuerClient {
    async fn issue_token(&self, identity: &AppIdentity) -> Result<IssuedToken, IssuerError> {
        request_token(&self.client, self.token_url.clone(), identity).await
    }
}

/// An error while attempting to request a new token from the issuer
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Unable to send a token request to the issuer
    #[error("error sending request to issuer")]
    RequestSend(#[source] reqwest_middleware::Error),
    /// The issuer answered with a non-success status
    #[error("issuer returned {status}: {body}")]
    ErrorStatus {
        /// The transport status
        status: reqwest::StatusCode,
        /// The body of the response
        body: String,
    },
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),
    /// Unable to deserialize the token body
    #[error("error deserializing token body from issuer: {body}")]
    TokenBody {
        /// The underlying parse error
        source: serde_json::Error,
        /// The body that failed to parse
        body: String,
    },
    /// The issuer returned a token without saying how long it lives
    #[error("issuer returned a token without a lifetime")]
    MissingLifetime,
    /// The issuer replied, but without a token
    #[error("issuer did not return a token (errcode {errcode}): {errmsg}")]
    EmptyToken {
        /// The error code reported by the issuer, zero if absent
        errcode: i64,
        /// The error message reported by the issuer
        errmsg: String,
    },
}

impl IssuerError {
    /// Whether the failure happened below the issuer's own protocol
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::RequestSend(_) | Self::ErrorStatus { .. } | Self::BodyRead(_)
        )
    }
}

#[tracing::instrument(
    err,
    skip(client, token_url, identity),
    fields(
        token_url = %token_url,
        app_id = %identity.app_id(),
    ),
)]
async fn request_token(
    client: &ClientWithMiddleware,
    token_url: Url,
    identity: &AppIdentity,
) -> Result<IssuedToken, IssuerError> {
    tracing::trace!("requesting token from issuer");

    let query = dto::TokenRequest::client_credential(identity.app_id(), identity.secret());
    let resp = client
        .get(token_url)
        .query(&query)
        .send()
        .await
        .map_err(IssuerError::RequestSend)?;

    tracing::debug!(
        response.status = resp.status().as_u16(),
        "received token response from issuer"
    );

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.map_err(IssuerError::BodyRead)?;
        return Err(IssuerError::ErrorStatus { status, body });
    }

    let body = resp.bytes().await.map_err(IssuerError::BodyRead)?;
    let resp: dto::TokenResponse =
        serde_json::from_slice(&body).map_err(|source| IssuerError::TokenBody {
            source,
            body: String::from_utf8_lossy(&body).into_owned(),
        })?;

    match (resp.access_token, resp.expires_in) {
        (Some(access_token), Some(expires_in)) if !access_token.is_empty() => {
            if expires_in == DurationSecs(0) {
                tracing::warn!("issuer returned an access token that has already expired");
            }
            tracing::info!(expires_in = expires_in.0, "received new access token");
            Ok(IssuedToken::new(access_token, expires_in))
        }
        (Some(access_token), None) if !access_token.is_empty() => {
            tracing::warn!("issuer returned an access token without a lifetime");
            Err(IssuerError::MissingLifetime)
        }
        _ => Err(IssuerError::EmptyToken {
            errcode: resp.errcode,
            errmsg: resp.errmsg,
        }),
    }
}
