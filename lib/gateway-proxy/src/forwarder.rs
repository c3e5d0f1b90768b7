//! Upstream request forwarding with timeout and connect-failure classification

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HeaderName;
use hyper::{HeaderMap, Method, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::tokio::TokioExecutor;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

/// Errors surfaced by a single upstream forward attempt
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to connect to upstream: {0}")]
    Connect(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Invalid upstream URI: {0}")]
    InvalidUri(String),
}

/// HTTP request forwarder for proxying requests to backend instances
/// with connection pooling and a per-request timeout.
pub struct RequestForwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl RequestForwarder {
    /// Create a new HTTP request forwarder with connection pooling
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        connector.set_keepalive(Some(Duration::from_secs(30)));

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(connector);

        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward one request attempt to the target URL and return the upstream
    /// response with its body collected.
    ///
    /// Connect failures are distinguished from timeouts and other upstream
    /// errors so the caller can retry them against a different instance.
    pub async fn forward(
        &self,
        target_url: &str,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Bytes>, ForwardError> {
        let uri: Uri = target_url
            .parse()
            .map_err(|_| ForwardError::InvalidUri(target_url.to_string()))?;

        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            // The client derives Host from the target URI
            if !is_hop_by_hop_header(name.as_str()) && name != &hyper::header::HOST {
                builder = builder.header(name, value);
            }
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|error| ForwardError::Upstream(error.to_string()))?;

        debug!("Forwarding request to {}", target_url);

        match tokio_timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                debug!("Upstream responded with status {}", response.status());
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop_headers(&mut parts.headers);
                let bytes = body
                    .collect()
                    .await
                    .map_err(|error| ForwardError::Upstream(error.to_string()))?
                    .to_bytes();
                Ok(Response::from_parts(parts, bytes))
            }
            Ok(Err(error)) => {
                if error.is_connect() {
                    warn!("Upstream connect failed for {}: {}", target_url, error);
                    Err(ForwardError::Connect(error.to_string()))
                } else {
                    warn!("Upstream request error for {}: {}", target_url, error);
                    Err(ForwardError::Upstream(error.to_string()))
                }
            }
            Err(_) => {
                warn!(
                    "Upstream request to {} timed out after {:?}",
                    target_url, self.timeout
                );
                Err(ForwardError::Timeout(self.timeout))
            }
        }
    }
}

/// Remove hop-by-hop headers from a header map in place
fn strip_hop_by_hop_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop_header(name.as_str()))
        .cloned()
        .collect();
    for name in names {
        headers.remove(&name);
    }
}

/// Check if header is hop-by-hop (should not be forwarded)
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
