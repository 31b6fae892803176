//! HTTP(S) handler

use crate::error::IoError;
use crate::handler::StorageHandler;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Reads documents with `GET` and stores them with a JSON `PUT`
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
}

impl HttpHandler {
    /// Create a handler with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns `IoError::Http` if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, IoError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IoError::http("<client>", e))?;
        Ok(Self { client })
    }
}

fn check_status(url: &str, response: &reqwest::blocking::Response) -> Result<(), IoError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(IoError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

impl StorageHandler for HttpHandler {
    fn name(&self) -> &'static str {
        "HttpHandler"
    }

    fn read(&self, path: &str) -> Result<String, IoError> {
        let response = self
            .client
            .get(path)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| IoError::http(path, e))?;
        check_status(path, &response)?;
        response.text().map_err(|e| IoError::http(path, e))
    }

    fn write(&self, buf: &str, path: &str) -> Result<(), IoError> {
        let body: serde_json::Value = serde_json::from_str(buf)?;
        let response = self
            .client
            .put(path)
            .json(&body)
            .send()
            .map_err(|e| IoError::http(path, e))?;
        check_status(path, &response)
    }

    fn list(&self, _path: &str) -> Result<Vec<String>, IoError> {
        Err(IoError::unsupported("listdir", "HttpHandler"))
    }
}
