use std::time::Duration;

use async_trait::async_trait;

use crate::error::RatemeterError;
use crate::http::response::TransportResponse;
use crate::http::transport::{Transport, TransportError};

/// [`Transport`] backed by a shared reqwest client.
///
/// Keep-alive is off by default, so each request opens its own connection.
/// TLS goes through rustls, which offers HTTP/2 via ALPN.
pub struct HttpTransport {
    inner: reqwest::Client,
}

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: String,
    keep_alive: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: format!("ratemeter/{}", env!("CARGO_PKG_VERSION")),
            keep_alive: false,
        }
    }
}

impl HttpTransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-wide timeout; each request may tighten it further.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn build(self) -> Result<HttpTransport, RatemeterError> {
        let idle_per_host = if self.keep_alive { usize::MAX } else { 0 };
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(idle_per_host)
            .user_agent(self.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpTransport { inner: client })
    }
}

impl HttpTransport {
    /// Returns a builder for customising the transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        let response = self
            .inner
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status = response.status().as_u16();
        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| classify_error(e, timeout))?;
        let body = String::from_utf8_lossy(&body_bytes).into_owned();

        Ok(TransportResponse { status, body })
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
