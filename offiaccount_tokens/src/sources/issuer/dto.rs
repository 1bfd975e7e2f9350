//! DTOs for interacting with the token issuer

use offiaccount_clock::DurationSecs;
use serde::{Deserialize, Serialize};

use crate::{AppIdRef, AppSecretRef};

/// Query parameters sent to the issuer
#[derive(Debug, Serialize)]
pub(super) struct TokenRequest<'a> {
    pub grant_type: &'static str,
    pub appid: &'a AppIdRef,
    pub secret: &'a str,
}

impl<'a> TokenRequest<'a> {
    pub fn client_credential(appid: &'a AppIdRef, secret: &'a AppSecretRef) -> Self {
        Self {
            grant_type: "client_credential",
            appid,
            secret: secret.as_str(),
        }
    }
}

/// The issuer's reply
///
/// A successful reply carries `access_token` and `expires_in`; a rejection
/// omits the token and instead carries `errcode` and `errmsg`.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}
