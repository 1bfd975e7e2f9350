//! Endpoint wrappers built on [`Client`][crate::Client]
//!
//! Each wrapper only knows its path and how to shape its payload; token
//! handling and error classification happen in the client.

pub mod ai;

/// The content type the platform expects for JSON payloads
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";

/// Appends URL-encoded `params` to `path`
fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_owned();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{path}?{query}")
}
