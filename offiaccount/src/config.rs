//! Client configuration

use std::{sync::Arc, time::Duration};

use offiaccount_tokens::{
    sources::{InMemoryCredentialCache, IssuerClient, DEFAULT_BASE_URL},
    AccessTokenManager, AppId, AppIdentity, AppSecret, EndpointError, TokenLifetimeConfig,
};
use reqwest::Url;
use reqwest_middleware::ClientBuilder;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    filter::{ResponseFilter, DEFAULT_INVALID_TOKEN_CODES},
    Client,
};

/// Everything needed to build a [`Client`] with the default in-memory cache
///
/// Only the application identity is required when deserializing; every other
/// field falls back to its default.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// The application ID
    pub app_id: AppId,
    /// The application secret
    pub secret: AppSecret,
    /// The host serving both the issuer and the platform API
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Timeout applied to every HTTP request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Error codes with which the platform rejects an access token
    #[serde(default = "default_invalid_token_codes")]
    pub invalid_token_codes: Vec<i64>,
    /// The share of the issuer's reported lifetime a token is cached for
    #[serde(default = "default_token_ttl_ratio")]
    pub token_ttl_ratio: f64,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_invalid_token_codes() -> Vec<i64> {
    DEFAULT_INVALID_TOKEN_CODES.to_vec()
}

const fn default_token_ttl_ratio() -> f64 {
    0.9
}

impl ClientConfig {
    /// Constructs a configuration for an application, using defaults for everything else
    pub fn new(app_id: impl Into<AppId>, secret: impl Into<AppSecret>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            invalid_token_codes: default_invalid_token_codes(),
            token_ttl_ratio: default_token_ttl_ratio(),
        }
    }

    /// The application identity described by this configuration
    pub fn identity(&self) -> AppIdentity {
        AppIdentity::new(self.app_id.clone(), self.secret.clone())
    }

    /// The request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// An error while building a client from its configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The HTTP transport could not be initialized
    #[error("unable to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// The issuer URL could not be derived from the base URL
    #[error("invalid base URL")]
    BaseUrl(#[from] EndpointError),
}

impl Client {
    /// Builds a client, its own access token manager and an in-memory cache from `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let reqwest_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        let http = ClientBuilder::new(reqwest_client).build();

        let issuer = IssuerClient::new(http.clone(), &config.base_url)?;
        let manager = AccessTokenManager::new(issuer, InMemoryCredentialCache::new())
            .with_lifetime_config(TokenLifetimeConfig::new(config.token_ttl_ratio));

        tracing::debug!(
            app_id = %config.app_id,
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "building platform client"
        );

        Ok(Client::new(config.identity(), Arc::new(manager), http)
            .with_base_url(config.base_url.clone())
            .with_response_filter(
                ResponseFilter::default()
                    .with_invalid_token_codes(config.invalid_token_codes.iter().copied()),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_identity_is_required() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"app_id":"wx-app","secret":"s3cr3t"}"#).unwrap();

        assert_eq!(config.app_id.as_str(), "wx-app");
        assert_eq!(config.base_url.as_str(), "https://api.weixin.qq.com/");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.invalid_token_codes, vec![40001, 40014]);
        assert_eq!(config.token_ttl_ratio, 0.9);
    }

    #[test]
    fn overrides_are_honored() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "app_id": "wx-app",
                "secret": "s3cr3t",
                "base_url": "http://127.0.0.1:8080",
                "timeout_secs": 3,
                "invalid_token_codes": [40001, 40014, 42001],
                "token_ttl_ratio": 0.5
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_url.port(), Some(8080));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.invalid_token_codes, vec![40001, 40014, 42001]);
        assert_eq!(config.token_ttl_ratio, 0.5);
    }

    #[test]
    fn client_is_built_from_config() {
        let config = ClientConfig::new("wx-app", "s3cr3t");
        let client = Client::from_config(&config).unwrap();

        assert_eq!(client.identity().app_id().as_str(), "wx-app");
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = ClientConfig::new("wx-app", "s3cr3t");
        assert!(!format!("{:?}", config).contains("s3cr3t"));
    }

    mod when_the_network_stalls {
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::{TcpListener, TcpStream},
        };

        use super::*;
        use crate::Error;

        const TOKEN_BODY: &str = r#"{"access_token":"T1","expires_in":7200}"#;

        /// Accepts connections and never answers them
        async fn silent_server() -> Url {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let mut held = Vec::new();
                while let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            });
            Url::parse(&format!("http://{addr}")).unwrap()
        }

        /// Answers token requests and stalls every other request
        async fn stalling_platform() -> Url {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let mut held = Vec::new();
                while let Ok((mut socket, _)) = listener.accept().await {
                    let head = read_head(&mut socket).await;
                    if head.starts_with(b"GET /cgi-bin/token") {
                        let reply = format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{TOKEN_BODY}",
                            TOKEN_BODY.len()
                        );
                        let _ = socket.write_all(reply.as_bytes()).await;
                    } else {
                        held.push(socket);
                    }
                }
            });
            Url::parse(&format!("http://{addr}")).unwrap()
        }

        async fn read_head(socket: &mut TcpStream) -> Vec<u8> {
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&chunk[..n]),
                }
            }
            head
        }

        fn client_for(base_url: Url) -> Client {
            let mut config = ClientConfig::new("wx-app", "s3cr3t");
            config.base_url = base_url;
            config.timeout_secs = 1;
            Client::from_config(&config).unwrap()
        }

        #[tokio::test]
        async fn stalled_issuer_is_a_transport_error() {
            let client = client_for(silent_server().await);

            let err = tokio::time::timeout(Duration::from_secs(5), client.access_token())
                .await
                .expect("token request should time out on its own")
                .unwrap_err();
            assert!(matches!(err, Error::Refresh(_)));
            assert!(err.is_transport());

            let err = tokio::time::timeout(Duration::from_secs(5), client.http_get("/cgi-bin/menu/get"))
                .await
                .expect("platform call should time out on its own")
                .unwrap_err();
            assert!(err.is_transport());
        }

        #[tokio::test]
        async fn stalled_platform_call_is_a_transport_error() {
            let client = client_for(stalling_platform().await);

            assert_eq!(client.access_token().await.unwrap().as_str(), "T1");

            let err = tokio::time::timeout(Duration::from_secs(5), client.http_get("/cgi-bin/menu/get"))
                .await
                .expect("platform call should time out on its own")
                .unwrap_err();
            assert!(matches!(err, Error::Transport(_)));
            assert!(err.is_transport());
        }
    }
}
