//! AWS Signature Version 4 signing for the S3 transport
//!
//! Requests are signed with the `AWS4-HMAC-SHA256` header scheme over the
//! `host`, `x-amz-content-sha256`, `x-amz-date` and, for temporary
//! credentials, `x-amz-security-token` headers.

use crate::error::IoError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Access key pair for signing
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token of temporary credentials
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl AwsCredentials {
    /// Create long-term credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach the session token of temporary credentials
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

/// Signs S3 requests for one region
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
}

impl SigV4Signer {
    /// Create a signer
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    /// Headers to attach to a `method` request for `url` carrying `payload`
    ///
    /// The `host` header is signed but not returned; the HTTP client sends
    /// it from the URL.
    ///
    /// # Errors
    ///
    /// Returns `IoError::Signing` if the HMAC cannot be keyed.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        payload: &[u8],
        at: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, IoError> {
        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let date = at.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut headers = vec![
            ("host", host(url)),
            ("x-amz-content-sha256", payload_hash.clone()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }

        let signed_headers = headers.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(";");
        let canonical = canonical_request(method, url, &headers, &signed_headers, &payload_hash);
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let mut key = hmac(format!("AWS4{}", self.credentials.secret_access_key).as_bytes(), &date)?;
        for part in [self.region.as_str(), SERVICE, "aws4_request"] {
            key = hmac(&key, part)?;
        }
        let signature = hex::encode(hmac(&key, &string_to_sign)?);

        headers.retain(|(name, _)| *name != "host");
        headers.push((
            "authorization",
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        Ok(headers)
    }
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, IoError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| IoError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(&'static str, String)],
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let path = url
        .path_segments()
        .map(|segments| {
            segments
                .map(|segment| uri_encode(&percent_decode(segment)))
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (uri_encode(&name), uri_encode(&value)))
        .collect();
    query.sort();
    let query = query
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();

    format!("{method}\n/{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}")
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn uri_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| text.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                decoded.push(byte);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
