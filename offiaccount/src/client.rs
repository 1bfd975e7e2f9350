use std::{fmt, sync::Arc};

use bytes::Bytes;
use offiaccount_tokens::{
    resolve_endpoint, sources::DEFAULT_BASE_URL, AccessToken, AccessTokenManager, AccessTokenRef,
    AppIdentity,
};
use reqwest::{header, Method, Url};
use reqwest_middleware::ClientWithMiddleware;

use crate::{
    filter::{Outcome, ResponseFilter},
    Error,
};

/// A client for the platform API acting on behalf of one application
///
/// Every request carries the application's current access token. When the
/// platform rejects that token, the client obtains a new one and sends the
/// request again, exactly once.
#[derive(Clone)]
pub struct Client {
    identity: AppIdentity,
    manager: Arc<AccessTokenManager>,
    http: ClientWithMiddleware,
    base_url: Url,
    filter: ResponseFilter,
}

struct Payload<'a> {
    body: Bytes,
    content_type: &'a str,
}

impl Client {
    /// Constructs a new client for `identity`
    ///
    /// Requests are sent to the public platform host through `http`. A manager
    /// may be shared between clients of several applications.
    pub fn new(
        identity: AppIdentity,
        manager: Arc<AccessTokenManager>,
        http: ClientWithMiddleware,
    ) -> Self {
        Self {
            identity,
            manager,
            http,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            filter: ResponseFilter::default(),
        }
    }

    /// Sends requests to `base_url` instead of the public platform host
    ///
    /// Request paths are appended to the path of `base_url`, so a gateway
    /// prefix such as `http://gateway.internal/wx-proxy` is kept.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Replaces the default response filter
    pub fn with_response_filter(mut self, filter: ResponseFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The application this client acts for
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Sends a `GET` request to `path`, which may include a query string
    pub async fn http_get(&self, path: &str) -> Result<Bytes, Error> {
        self.execute(Method::GET, path, None).await
    }

    /// Sends a `POST` request with `body` to `path`, which may include a query string
    pub async fn http_post(
        &self,
        path: &str,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<Bytes, Error> {
        let payload = Payload {
            body: body.into(),
            content_type,
        };
        self.execute(Method::POST, path, Some(&payload)).await
    }

    /// Gets the application's current access token, refreshing it if required
    pub async fn access_token(&self) -> Result<AccessToken, Error> {
        Ok(self.manager.access_token(&self.identity).await?)
    }

    /// Obtains a new access token from the issuer, even if the cached one has not expired
    pub async fn force_refresh_access_token(&self) -> Result<AccessToken, Error> {
        Ok(self.manager.force_refresh(&self.identity).await?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Payload<'_>>,
    ) -> Result<Bytes, Error> {
        let url = resolve_endpoint(&self.base_url, path)?;

        let token = self.manager.access_token(&self.identity).await?;
        let envelope = match self.send(&method, &url, &token, payload, 1).await? {
            Outcome::CredentialInvalid(envelope) => envelope,
            outcome => return outcome.into_result(),
        };

        tracing::info!(
            app_id = %self.identity.app_id(),
            %method,
            path = url.path(),
            errcode = envelope.errcode,
            errmsg = %envelope.errmsg,
            "access token rejected, refreshing before retrying"
        );

        let token = self
            .manager
            .refresh_rejected(&self.identity, &token)
            .await?;
        self.send(&method, &url, &token, payload, 2)
            .await?
            .into_result()
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        token: &AccessTokenRef,
        payload: Option<&Payload<'_>>,
        attempt: u8,
    ) -> Result<Outcome, Error> {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("access_token", token.as_str());

        tracing::debug!(%method, path = url.path(), attempt, "sending platform request");

        let mut req = self.http.request(method.clone(), url);
        if let Some(payload) = payload {
            req = req
                .header(header::CONTENT_TYPE, payload.content_type)
                .body(payload.body.clone());
        }

        let resp = req.send().await.map_err(Error::Transport)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            attempt,
            "received platform response"
        );

        Ok(self.filter.filter(resp).await)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.identity)
            .field("base_url", &self.base_url.as_str())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
