//! Object-store handlers
//!
//! One [`ObjectStoreHandler`] serves each object-store scheme family. The
//! wire protocol lives behind the [`ObjectStore`] transport trait; the
//! defaults here speak the public REST APIs through a blocking `reqwest`
//! client. Rate-limited writes are retried when the handler carries a
//! [`RetryPolicy`].
//!
//! S3 requests are signed with AWS Signature Version 4 when an access key
//! pair is configured and go out anonymously otherwise, which suits public
//! buckets and endpoints that accept unsigned requests.

use crate::config::{env_credential, StorageConfig};
use crate::error::{IoError, TransportError};
use crate::handler::StorageHandler;
use crate::handlers::sigv4::{AwsCredentials, SigV4Signer};
use crate::retry::RetryPolicy;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, Url};
use std::sync::Arc;
use std::time::Duration;

/// A parsed `scheme://bucket/key` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Scheme without the `://` separator
    pub scheme: String,
    /// Bucket, or account host for Azure
    pub bucket: String,
    /// Object key; may be empty or a prefix
    pub key: String,
}

impl ObjectLocation {
    /// Parse a `scheme://bucket/key` path
    ///
    /// # Errors
    ///
    /// Returns `IoError::InvalidLocation` if the scheme or bucket is missing.
    pub fn parse(path: &str) -> Result<Self, IoError> {
        let (scheme, rest) = path
            .split_once("://")
            .ok_or_else(|| IoError::InvalidLocation(path.to_string()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme.is_empty() || bucket.is_empty() {
            return Err(IoError::InvalidLocation(path.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Render a sibling key in the same bucket as a full path
    #[must_use]
    pub fn with_key(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }
}

/// Wire protocol for one object-store family
#[cfg_attr(test, mockall::automock)]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's text
    ///
    /// # Errors
    ///
    /// Returns `IoError::Transport` for request failures.
    fn get(&self, location: &ObjectLocation) -> Result<String, IoError>;

    /// Store text as an object
    ///
    /// # Errors
    ///
    /// Returns `IoError::Transport` for request failures.
    fn put(&self, location: &ObjectLocation, body: &str) -> Result<(), IoError>;

    /// List full paths of objects under the location's key prefix
    ///
    /// # Errors
    ///
    /// Returns `IoError::Transport` for request failures.
    fn list(&self, location: &ObjectLocation) -> Result<Vec<String>, IoError>;
}

/// Storage handler over an [`ObjectStore`] transport
pub struct ObjectStoreHandler {
    name: &'static str,
    store: Arc<dyn ObjectStore>,
    retry: Option<RetryPolicy>,
}

impl std::fmt::Debug for ObjectStoreHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreHandler")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn is_rate_limited(err: &IoError) -> bool {
    matches!(err, IoError::Transport(t) if t.is_rate_limited())
}

impl ObjectStoreHandler {
    /// Create a handler without write retries
    #[must_use]
    pub fn new(name: &'static str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name,
            store,
            retry: None,
        }
    }

    /// Retry rate-limited writes under `policy`
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// S3-compatible handler, shared by `s3://` and `minio://`
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the endpoint or client is invalid.
    pub fn s3(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self::new("S3Handler", Arc::new(S3Rest::new(config)?)))
    }

    /// Google Cloud Storage handler with rate-limit retry on write
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the endpoint or client is invalid.
    pub fn gcs(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self::new("GCSHandler", Arc::new(GcsRest::new(config)?)).with_retry(config.retry.clone()))
    }

    /// Azure Blob Storage handler
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the client is invalid.
    pub fn azure(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self::new("ABSHandler", Arc::new(AzureBlobRest::new(config)?)))
    }
}

impl StorageHandler for ObjectStoreHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, path: &str) -> Result<String, IoError> {
        self.store.get(&ObjectLocation::parse(path)?)
    }

    fn write(&self, buf: &str, path: &str) -> Result<(), IoError> {
        let location = ObjectLocation::parse(path)?;
        match &self.retry {
            Some(policy) => policy.run(is_rate_limited, |_| self.store.put(&location, buf)),
            None => self.store.put(&location, buf),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>, IoError> {
        self.store.list(&ObjectLocation::parse(path)?)
    }
}

fn build_client(config: &StorageConfig) -> Result<Client, IoError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| IoError::http("<client>", e))
}

fn parse_base(endpoint: &str) -> Result<Url, IoError> {
    let url = Url::parse(endpoint).map_err(|e| IoError::InvalidLocation(format!("{endpoint}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(IoError::InvalidLocation(endpoint.to_string()));
    }
    Ok(url)
}

pub(crate) fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn execute(url: &Url, request: RequestBuilder) -> Result<Response, IoError> {
    let response = request.send().map_err(|e| {
        TransportError::new(url.as_str(), e.status().map(|s| s.as_u16()), e.to_string())
    })?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(TransportError::new(url.as_str(), Some(status.as_u16()), body).into())
    }
}

fn text_body(url: &Url, response: Response) -> Result<String, IoError> {
    response
        .text()
        .map_err(|e| TransportError::new(url.as_str(), None, e.to_string()).into())
}

fn bearer(request: RequestBuilder, token_env: &str) -> RequestBuilder {
    match env_credential(token_env) {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Collect the text of every `tag` element in an XML body
///
/// Tags match on their local name, so namespace prefixes are ignored.
fn xml_values(body: &str, tag: &str) -> Result<Vec<String>, IoError> {
    let mut reader = Reader::from_str(body);
    let mut values = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) if start.local_name().as_ref() == tag.as_bytes() => {
                current = Some(String::new());
            }
            Event::Empty(empty) if empty.local_name().as_ref() == tag.as_bytes() => {
                values.push(String::new());
            }
            Event::Text(text) => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(end) if end.local_name().as_ref() == tag.as_bytes() => {
                values.extend(current.take());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(values)
}

/// Path-style S3 REST transport
#[derive(Debug, Clone)]
pub struct S3Rest {
    client: Client,
    endpoint: Url,
    region: String,
    access_key_env: String,
    secret_key_env: String,
    session_token_env: String,
}

impl S3Rest {
    /// Create a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the endpoint or client is invalid.
    pub fn new(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: parse_base(&config.s3_endpoint)?,
            region: config.s3_region.clone(),
            access_key_env: config.s3_access_key_env.clone(),
            secret_key_env: config.s3_secret_key_env.clone(),
            session_token_env: config.s3_session_token_env.clone(),
        })
    }

    fn object_url(&self, location: &ObjectLocation) -> Url {
        let mut segments = vec![location.bucket.as_str()];
        segments.extend(location.key.split('/'));
        with_segments(&self.endpoint, &segments)
    }

    /// Credentials from the environment, if an access key pair is set
    fn credentials(&self) -> Option<AwsCredentials> {
        let credentials = AwsCredentials::new(
            env_credential(&self.access_key_env)?,
            env_credential(&self.secret_key_env)?,
        );
        Some(match env_credential(&self.session_token_env) {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }

    fn send(&self, method: Method, url: &Url, body: Option<&str>) -> Result<Response, IoError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        match self.credentials() {
            Some(credentials) => {
                let signer = SigV4Signer::new(credentials, self.region.as_str());
                let payload = body.unwrap_or_default().as_bytes();
                for (name, value) in signer.sign(method.as_str(), url, payload, Utc::now())? {
                    request = request.header(name, value);
                }
            }
            None => tracing::debug!(url = %url, "no S3 access key configured; sending unsigned"),
        }
        execute(url, request)
    }
}

impl ObjectStore for S3Rest {
    fn get(&self, location: &ObjectLocation) -> Result<String, IoError> {
        let url = self.object_url(location);
        let response = self.send(Method::GET, &url, None)?;
        text_body(&url, response)
    }

    fn put(&self, location: &ObjectLocation, body: &str) -> Result<(), IoError> {
        let url = self.object_url(location);
        self.send(Method::PUT, &url, Some(body)).map(drop)
    }

    fn list(&self, location: &ObjectLocation) -> Result<Vec<String>, IoError> {
        let mut url = with_segments(&self.endpoint, &[location.bucket.as_str()]);
        url.query_pairs_mut()
            .append_pair("list-type", "2")
            .append_pair("prefix", &location.key);
        let response = self.send(Method::GET, &url, None)?;
        let body = text_body(&url, response)?;
        Ok(xml_values(&body, "Key")?
            .iter()
            .map(|key| location.with_key(key))
            .collect())
    }
}

/// GCS JSON-API transport with an OAuth bearer token
#[derive(Debug, Clone)]
pub struct GcsRest {
    client: Client,
    endpoint: Url,
    token_env: String,
}

impl GcsRest {
    /// Create a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the endpoint or client is invalid.
    pub fn new(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: parse_base(&config.gcs_endpoint)?,
            token_env: config.gcs_token_env.clone(),
        })
    }
}

impl ObjectStore for GcsRest {
    fn get(&self, location: &ObjectLocation) -> Result<String, IoError> {
        let mut url = with_segments(
            &self.endpoint,
            &["storage", "v1", "b", &location.bucket, "o", &location.key],
        );
        url.query_pairs_mut().append_pair("alt", "media");
        let response = execute(&url, bearer(self.client.get(url.clone()), &self.token_env))?;
        text_body(&url, response)
    }

    fn put(&self, location: &ObjectLocation, body: &str) -> Result<(), IoError> {
        let mut url = with_segments(
            &self.endpoint,
            &["upload", "storage", "v1", "b", &location.bucket, "o"],
        );
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &location.key);
        let request = self.client.post(url.clone()).body(body.to_string());
        execute(&url, bearer(request, &self.token_env)).map(drop)
    }

    fn list(&self, location: &ObjectLocation) -> Result<Vec<String>, IoError> {
        let mut url = with_segments(&self.endpoint, &["storage", "v1", "b", &location.bucket, "o"]);
        url.query_pairs_mut().append_pair("prefix", &location.key);
        let response = execute(&url, bearer(self.client.get(url.clone()), &self.token_env))?;
        let listing: serde_json::Value = serde_json::from_str(&text_body(&url, response)?)?;
        Ok(listing
            .get("items")
            .and_then(serde_json::Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("name").and_then(serde_json::Value::as_str))
            .map(|name| location.with_key(name))
            .collect())
    }
}

/// Azure Blob REST transport authenticated by SAS token
///
/// Locations read `abs://<account>.blob.core.windows.net/<container>/<blob>`.
#[derive(Debug, Clone)]
pub struct AzureBlobRest {
    client: Client,
    sas_env: String,
}

impl AzureBlobRest {
    /// Create a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self, IoError> {
        Ok(Self {
            client: build_client(config)?,
            sas_env: config.azure_sas_env.clone(),
        })
    }

    fn url(&self, location: &ObjectLocation, segments: &[&str]) -> Result<Url, IoError> {
        let base = parse_base(&format!("https://{}/", location.bucket))?;
        let mut url = with_segments(&base, segments);
        if let Some(sas) = env_credential(&self.sas_env) {
            let sas = sas.trim_start_matches('?');
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{sas}"),
                _ => sas.to_string(),
            };
            url.set_query(Some(&query));
        }
        Ok(url)
    }
}

impl ObjectStore for AzureBlobRest {
    fn get(&self, location: &ObjectLocation) -> Result<String, IoError> {
        let segments: Vec<&str> = location.key.split('/').collect();
        let url = self.url(location, &segments)?;
        let response = execute(&url, self.client.get(url.clone()))?;
        text_body(&url, response)
    }

    fn put(&self, location: &ObjectLocation, body: &str) -> Result<(), IoError> {
        let segments: Vec<&str> = location.key.split('/').collect();
        let url = self.url(location, &segments)?;
        let request = self
            .client
            .put(url.clone())
            .header("x-ms-blob-type", "BlockBlob")
            .body(body.to_string());
        execute(&url, request).map(drop)
    }

    fn list(&self, location: &ObjectLocation) -> Result<Vec<String>, IoError> {
        let (container, prefix) = location.key.split_once('/').unwrap_or((location.key.as_str(), ""));
        let mut url = self.url(location, &[container])?;
        let sas = url.query().map(str::to_string);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("restype", "container")
            .append_pair("comp", "list")
            .append_pair("prefix", prefix);
        if let Some(sas) = sas {
            let query = format!("{}&{sas}", url.query().unwrap_or_default());
            url.set_query(Some(&query));
        }
        let response = execute(&url, self.client.get(url.clone()))?;
        let body = text_body(&url, response)?;
        Ok(xml_values(&body, "Name")?
            .iter()
            .map(|name| location.with_key(&format!("{container}/{name}")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn rate_limited() -> IoError {
        TransportError::new("gs://bucket/doc.ipynb", Some(429), "Too Many Requests").into()
    }

    #[test]
    fn parses_locations() {
        let loc = ObjectLocation::parse("s3://bucket/path/to/doc.ipynb").unwrap();
        assert_eq!(loc.scheme, "s3");
        assert_eq!(loc.bucket, "bucket");
        assert_eq!(loc.key, "path/to/doc.ipynb");
        assert_eq!(loc.with_key("other.ipynb"), "s3://bucket/other.ipynb");

        let root = ObjectLocation::parse("gs://bucket").unwrap();
        assert_eq!(root.key, "");

        assert!(ObjectLocation::parse("bucket/key").is_err());
        assert!(ObjectLocation::parse("s3:///key").is_err());
    }

    #[test]
    fn write_succeeds_after_two_rate_limits() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        store
            .expect_put()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(rate_limited()));
        store
            .expect_put()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let handler = ObjectStoreHandler::new("GCSHandler", Arc::new(store))
            .with_retry(RetryPolicy::immediate(3));
        handler.write("{}", "gs://bucket/doc.ipynb").unwrap();
    }

    #[test]
    fn exhausted_retries_return_original_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .times(3)
            .returning(|_, _| Err(rate_limited()));

        let handler = ObjectStoreHandler::new("GCSHandler", Arc::new(store))
            .with_retry(RetryPolicy::immediate(3));
        let err = handler.write("{}", "gs://bucket/doc.ipynb").unwrap_err();
        match err {
            IoError::Transport(t) => {
                assert_eq!(t.status, Some(429));
                assert_eq!(t.message, "Too Many Requests");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_failures_are_not_retried() {
        let mut store = MockObjectStore::new();
        store.expect_put().times(1).returning(|_, _| {
            Err(TransportError::new("gs://bucket/doc.ipynb", Some(403), "Forbidden").into())
        });

        let handler = ObjectStoreHandler::new("GCSHandler", Arc::new(store))
            .with_retry(RetryPolicy::immediate(3));
        assert!(handler.write("{}", "gs://bucket/doc.ipynb").is_err());
    }

    #[test]
    fn handler_without_retry_fails_once() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .times(1)
            .returning(|_, _| Err(rate_limited()));
        let handler = ObjectStoreHandler::new("S3Handler", Arc::new(store));
        assert!(handler.write("{}", "s3://bucket/doc.ipynb").is_err());
    }

    #[test]
    fn read_and_list_delegate() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .withf(|loc| loc.bucket == "bucket" && loc.key == "a.ipynb")
            .returning(|_| Ok("{}".to_string()));
        store
            .expect_list()
            .returning(|loc| Ok(vec![loc.with_key("a.ipynb")]));

        let handler = ObjectStoreHandler::new("S3Handler", Arc::new(store));
        assert_eq!(handler.read("s3://bucket/a.ipynb").unwrap(), "{}");
        assert_eq!(
            handler.list("s3://bucket/").unwrap(),
            vec!["s3://bucket/a.ipynb".to_string()]
        );
    }

    #[test]
    fn xml_listing_values() {
        let body = "<ListBucketResult><Contents><Key>a&amp;b.ipynb</Key></Contents><Contents><Key>c.ipynb</Key></Contents></ListBucketResult>";
        assert_eq!(xml_values(body, "Key").unwrap(), vec!["a&b.ipynb", "c.ipynb"]);
    }

    #[test]
    fn xml_listing_handles_namespaces_cdata_and_references() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<s3:ListBucketResult xmlns:s3="http://s3.amazonaws.com/doc/2006-03-01/">
  <s3:KeyCount>3</s3:KeyCount>
  <s3:Contents><s3:Key>x &#38; y.ipynb</s3:Key></s3:Contents>
  <s3:Contents><s3:Key><![CDATA[<raw>.ipynb]]></s3:Key></s3:Contents>
  <s3:Contents><s3:Key>&lt;tag&gt;.ipynb</s3:Key></s3:Contents>
</s3:ListBucketResult>"#;
        assert_eq!(
            xml_values(body, "Key").unwrap(),
            vec!["x & y.ipynb", "<raw>.ipynb", "<tag>.ipynb"]
        );
    }

    #[test]
    fn malformed_xml_listing_is_an_error() {
        let body = "<EnumerationResults><Blobs><Blob><Name>a.ipynb</Nam></Blob></Blobs>";
        assert!(matches!(xml_values(body, "Name"), Err(IoError::Xml(_))));
    }

    #[test]
    fn gcs_object_urls_encode_keys() {
        let base = parse_base("https://storage.googleapis.com").unwrap();
        let url = with_segments(&base, &["storage", "v1", "b", "bucket", "o", "dir/doc.ipynb"]);
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bucket/o/dir%2Fdoc.ipynb"
        );
    }
}
