//! Classification of platform responses

use std::collections::BTreeSet;

use bytes::Bytes;
use serde::Deserialize;

use crate::Error;

/// Error codes with which the platform reports an invalid or expired access token
pub const DEFAULT_INVALID_TOKEN_CODES: [i64; 2] = [40001, 40014];

/// The error fields every platform response may carry
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    /// The error code, zero on success
    #[serde(default)]
    pub errcode: i64,
    /// The error message
    #[serde(default)]
    pub errmsg: String,
}

/// The classified result of a platform call
#[derive(Debug)]
pub enum Outcome {
    /// The call succeeded; holds the complete response body
    Success(Bytes),
    /// The platform rejected the access token
    ///
    /// A fresh token may succeed where this one did not.
    CredentialInvalid(ErrorEnvelope),
    /// The call failed for any other reason
    Failure(Error),
}

impl Outcome {
    /// Converts the outcome into a result, treating a rejected token as final
    pub fn into_result(self) -> Result<Bytes, Error> {
        match self {
            Self::Success(body) => Ok(body),
            Self::CredentialInvalid(envelope) => Err(Error::CredentialInvalid {
                errcode: envelope.errcode,
                errmsg: envelope.errmsg,
            }),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Inspects platform responses for transport failures and platform-reported errors
#[derive(Clone, Debug)]
pub struct ResponseFilter {
    invalid_token_codes: BTreeSet<i64>,
}

impl Default for ResponseFilter {
    /// Treats the codes in [`DEFAULT_INVALID_TOKEN_CODES`] as token rejections
    fn default() -> Self {
        Self {
            invalid_token_codes: DEFAULT_INVALID_TOKEN_CODES.into_iter().collect(),
        }
    }
}

impl ResponseFilter {
    /// Replaces the set of error codes that mean the access token was rejected
    pub fn with_invalid_token_codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.invalid_token_codes = codes.into_iter().collect();
        self
    }

    /// Whether `errcode` means the access token was rejected
    #[inline]
    pub fn is_invalid_token_code(&self, errcode: i64) -> bool {
        self.invalid_token_codes.contains(&errcode)
    }

    /// Reads and classifies a complete response
    ///
    /// The body of a response with a non-success status is not read.
    pub async fn filter(&self, response: reqwest::Response) -> Outcome {
        let status = response.status();
        if !status.is_success() {
            return Outcome::Failure(Error::Status { status });
        }

        match response.bytes().await {
            Ok(body) => self.classify(body),
            Err(err) => Outcome::Failure(Error::BodyRead(err)),
        }
    }

    /// Classifies a response body by its error envelope
    pub fn classify(&self, body: Bytes) -> Outcome {
        let envelope: ErrorEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(source) => {
                return Outcome::Failure(Error::Parse {
                    source,
                    body: String::from_utf8_lossy(&body).into_owned(),
                })
            }
        };

        if self.is_invalid_token_code(envelope.errcode) {
            Outcome::CredentialInvalid(envelope)
        } else if envelope.errcode != 0 {
            Outcome::Failure(Error::Application {
                errcode: envelope.errcode,
                errmsg: envelope.errmsg,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        } else {
            Outcome::Success(body)
        }
    }
}
