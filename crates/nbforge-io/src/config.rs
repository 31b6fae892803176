//! Storage backend configuration

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Endpoints, credential sources and retry policy for remote handlers
///
/// Credentials are never stored here directly; only the names of the
/// environment variables holding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL for `s3://` and `minio://` paths (path-style addressing)
    pub s3_endpoint: String,
    /// Signing region for the S3 endpoint
    pub s3_region: String,
    /// Environment variable holding the S3 access key id
    pub s3_access_key_env: String,
    /// Environment variable holding the S3 secret access key
    pub s3_secret_key_env: String,
    /// Environment variable holding an S3 session token
    pub s3_session_token_env: String,
    /// Base URL of the GCS JSON API
    pub gcs_endpoint: String,
    /// Environment variable holding a GCS OAuth access token
    pub gcs_token_env: String,
    /// Environment variable holding an Azure SAS token
    pub azure_sas_env: String,
    /// Request timeout for remote handlers, in seconds
    pub timeout_secs: u64,
    /// Retry policy for rate-limited writes
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            s3_endpoint: "https://s3.amazonaws.com".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_access_key_env: "AWS_ACCESS_KEY_ID".to_string(),
            s3_secret_key_env: "AWS_SECRET_ACCESS_KEY".to_string(),
            s3_session_token_env: "AWS_SESSION_TOKEN".to_string(),
            gcs_endpoint: "https://storage.googleapis.com".to_string(),
            gcs_token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
            azure_sas_env: "AZURE_STORAGE_SAS_TOKEN".to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Set the S3 endpoint
    #[must_use]
    pub fn with_s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.s3_endpoint = endpoint.into();
        self
    }

    /// Set the S3 signing region
    #[must_use]
    pub fn with_s3_region(mut self, region: impl Into<String>) -> Self {
        self.s3_region = region.into();
        self
    }

    /// Set the GCS endpoint
    #[must_use]
    pub fn with_gcs_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.gcs_endpoint = endpoint.into();
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Read a credential from the named environment variable
pub(crate) fn env_credential(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
