//! Blocking HTTP clients for the two network edges: the structured
//! extraction service (image in, JSON text out) and plain file fetches for
//! spreadsheet import. Both sit behind traits so tests use the mocks below.

use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Cannot connect to {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Malformed response body: {0}")]
    ResponseParsing(String),
}

/// Extraction service endpoint and transfer limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub extract_path: String,
    pub timeout_secs: u64,
    /// Upper bound on fetched file size.
    pub max_download_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            extract_path: "/v1/extract-parts".to_string(),
            timeout_secs: 60,
            max_download_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Sends a document image to the extraction service and returns its raw
/// response text (JSON, possibly fenced or wrapped in commentary).
pub trait ExtractionClient {
    fn extract_parts(&self, image: &[u8], mime_type: &str) -> Result<String, RemoteError>;
}

/// Fetches file bytes by URL.
pub trait RemoteSource {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}

const EXTRACTION_INSTRUCTIONS: &str = "Return a JSON array of cut parts. Each item: \
{\"label\": string?, \"L\": number, \"W\": number, \"qty\": number?, \"material\": string?, \
\"grain\": \"along_l\"|\"along_w\"|\"none\"?, \"edges\": [\"L1\",\"L2\",\"W1\",\"W2\"]?}. \
Dimensions in millimetres.";

#[derive(Serialize)]
struct ExtractRequest<'a> {
    image: String,
    mime_type: &'a str,
    instructions: &'a str,
}

fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, RemoteError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RemoteError::HttpClient(e.to_string()))
}

fn map_send_error(e: reqwest::Error, target: &str, timeout_secs: u64) -> RemoteError {
    if e.is_connect() {
        RemoteError::Connection(target.to_string())
    } else if e.is_timeout() {
        RemoteError::Timeout(timeout_secs)
    } else {
        RemoteError::HttpClient(e.to_string())
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

/// HTTP client for the extraction service.
pub struct HttpExtractionClient {
    endpoint: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpExtractionClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            endpoint: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.extract_path.trim_start_matches('/')
            ),
            client: build_client(config.timeout_secs)?,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ExtractionClient for HttpExtractionClient {
    fn extract_parts(&self, image: &[u8], mime_type: &str) -> Result<String, RemoteError> {
        let _span = tracing::info_span!(
            "extraction_request",
            endpoint = %self.endpoint,
            image_size = image.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let body = ExtractRequest {
            image: base64::engine::general_purpose::STANDARD.encode(image),
            mime_type,
            instructions: EXTRACTION_INSTRUCTIONS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| map_send_error(e, &self.endpoint, self.timeout_secs))?;
        let text = check_status(response)?
            .text()
            .map_err(|e| RemoteError::ResponseParsing(e.to_string()))?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = text.len(),
            "Extraction service responded"
        );
        Ok(text)
    }
}

/// Plain GET file fetcher with a size cap.
pub struct HttpRemoteSource {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpRemoteSource {
    pub fn new(config: &ServiceConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            timeout_secs: config.timeout_secs,
            max_bytes: config.max_download_bytes,
        })
    }
}

impl RemoteSource for HttpRemoteSource {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let _span = tracing::info_span!("remote_fetch", url = %url).entered();

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| map_send_error(e, url, self.timeout_secs))?;
        let response = check_status(response)?;
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(RemoteError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let bytes = response
            .bytes()
            .map_err(|e| RemoteError::ResponseParsing(e.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(RemoteError::TooLarge {
                limit: self.max_bytes,
            });
        }
        tracing::debug!(bytes = bytes.len(), "Remote file fetched");
        Ok(bytes.to_vec())
    }
}

/// Mock extraction client for testing; returns a configured response.
pub struct MockExtractionClient {
    response: Result<String, RemoteError>,
}

impl MockExtractionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

impl ExtractionClient for MockExtractionClient {
    fn extract_parts(&self, _image: &[u8], _mime_type: &str) -> Result<String, RemoteError> {
        self.response.clone()
    }
}

/// Mock file source for testing.
pub struct MockRemoteSource {
    response: Result<Vec<u8>, RemoteError>,
}

impl MockRemoteSource {
    pub fn new(response: Result<Vec<u8>, RemoteError>) -> Self {
        Self { response }
    }
}

impl RemoteSource for MockRemoteSource {
    fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, RemoteError> {
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path() {
        let config = ServiceConfig {
            base_url: "http://svc.local/".into(),
            extract_path: "/extract".into(),
            ..ServiceConfig::default()
        };
        let client = HttpExtractionClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://svc.local/extract");
    }

    #[test]
    fn unreachable_service_is_an_error() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 2,
            ..ServiceConfig::default()
        };
        let client = HttpExtractionClient::new(&config).unwrap();
        let err = client.extract_parts(b"img", "image/png").unwrap_err();
        assert!(
            matches!(err, RemoteError::Connection(_) | RemoteError::HttpClient(_) | RemoteError::Timeout(_)),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockExtractionClient::new("[]");
        assert_eq!(client.extract_parts(b"", "image/png").unwrap(), "[]");

        let failing = MockExtractionClient::failing(RemoteError::Timeout(5));
        assert_eq!(failing.extract_parts(b"", "image/png"), Err(RemoteError::Timeout(5)));
    }

    #[test]
    fn request_body_is_base64() {
        let body = ExtractRequest {
            image: base64::engine::general_purpose::STANDARD.encode(b"abc"),
            mime_type: "image/png",
            instructions: EXTRACTION_INSTRUCTIONS,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["image"], "YWJj");
        assert_eq!(json["mime_type"], "image/png");
    }

    #[test]
    fn default_config_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.timeout_secs, 60);
        assert!(config.max_download_bytes > 0);
    }
}
