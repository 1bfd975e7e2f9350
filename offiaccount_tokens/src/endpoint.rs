//! Resolution of endpoint paths against a configured base URL

use reqwest::Url;
use thiserror::Error;

/// An endpoint path that cannot be placed under the base URL
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The path names a URL of its own instead of a path under the base URL
    #[error("endpoint path must be relative to the base URL: {0}")]
    NotRelative(String),
    /// The combined URL is malformed
    #[error("invalid endpoint URL")]
    Parse(#[from] url::ParseError),
}

/// Appends `path` to the path of `base_url`
///
/// Unlike [`Url::join`], a leading `/` keeps the base URL's own path as a
/// prefix. The result always shares the base URL's scheme, host and port;
/// any query or fragment on the base URL is dropped.
pub fn resolve_endpoint(base_url: &Url, path: &str) -> Result<Url, EndpointError> {
    if Url::parse(path).is_ok() {
        return Err(EndpointError::NotRelative(path.to_owned()));
    }

    let mut base = base_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let prefix = base.as_str().trim_end_matches('/');
    let separator = if path.starts_with('/') { "" } else { "/" };
    let url = Url::parse(&format!("{prefix}{separator}{path}"))?;

    if url.origin() != base.origin() {
        return Err(EndpointError::NotRelative(path.to_owned()));
    }

    Ok(url)
}
