//! HMAC-SHA256 request signing for Azure data-plane endpoints.
//!
//! Both App Configuration and Communication Services authenticate access keys the same way:
//! the request date, host and body hash are signed with the decoded key, and the signature is
//! sent in the `Authorization` header alongside the `x-ms-date` and `x-ms-content-sha256`
//! headers it covers.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::Method;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

pub const DATE_HEADER: &str = "x-ms-date";
pub const CONTENT_HASH_HEADER: &str = "x-ms-content-sha256";
pub const AUTHORIZATION_HEADER: &str = "authorization";

const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("access key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),
    #[error("access key has an unusable length")]
    InvalidKeyLength(#[from] hmac::digest::InvalidLength),
    #[error("url {0} has no host to sign")]
    MissingHost(String),
}

/// An access key, optionally paired with the key id App Configuration expects as `Credential`.
#[derive(Clone)]
pub struct HmacCredential {
    id: Option<String>,
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

impl SignedHeaders {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (DATE_HEADER, self.date.as_str()),
            (CONTENT_HASH_HEADER, self.content_hash.as_str()),
            (AUTHORIZATION_HEADER, self.authorization.as_str()),
        ]
        .into_iter()
    }
}

impl HmacCredential {
    pub fn new(id: Option<String>, encoded_secret: &str) -> Result<Self, SigningError> {
        let secret = STANDARD.decode(encoded_secret.trim())?;
        Ok(HmacCredential { id, secret })
    }

    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<SignedHeaders, SigningError> {
        self.sign_at(method, url, body, Utc::now())
    }

    pub fn sign_at(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => return Err(SigningError::MissingHost(url.to_string())),
        };
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_owned(),
        };

        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_hash = STANDARD.encode(Sha256::digest(body));
        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method.as_str(),
            path_and_query,
            date,
            host,
            content_hash
        );

        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.secret)?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let authorization = match &self.id {
            Some(id) => format!(
                "HMAC-SHA256 Credential={id}&SignedHeaders={SIGNED_HEADERS}&Signature={signature}"
            ),
            None => format!("HMAC-SHA256 SignedHeaders={SIGNED_HEADERS}&Signature={signature}"),
        };

        Ok(SignedHeaders {
            date,
            content_hash,
            authorization,
        })
    }
}
