//! HTTP transport seam.
//!
//! Scenarios talk to the system under test only through [`Transport`], so
//! tests can substitute an in-process identity provider. The production
//! implementation is [`ReqwestTransport`]: redirects are never followed
//! (the Location header is the message), cookies are kept per instance and
//! every request is bounded by a timeout.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    /// `GET`, e.g. a Redirect binding URL.
    Get {
        /// Full URL including query.
        url: String,
    },
    /// Form-encoded `POST`.
    PostForm {
        /// Form action.
        url: String,
        /// Fields in order.
        fields: Vec<(String, String)>,
    },
}

impl OutboundRequest {
    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Get { url } | Self::PostForm { url, .. } => url,
        }
    }

    /// HTTP method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::PostForm { .. } => "POST",
        }
    }

    /// First form field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Get { .. } => None,
            Self::PostForm { fields, .. } => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
        }
    }
}

/// What came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExchange {
    /// URL the request was sent to.
    pub url: String,
    /// Status code.
    pub status: u16,
    /// `Location` header.
    pub location: Option<String>,
    /// Response body.
    pub body: String,
}

impl HttpExchange {
    /// Returns true for a 3xx with a Location header.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// Resolves a possibly relative reference (a Location or form action)
    /// against the request URL. An empty reference resolves to the request
    /// URL itself.
    ///
    /// # Errors
    ///
    /// Returns an error if neither the reference nor the request URL is a
    /// valid URL.
    pub fn resolve(&self, reference: &str) -> Result<String, url::ParseError> {
        if let Ok(absolute) = url::Url::parse(reference) {
            return Ok(absolute.to_string());
        }
        Ok(url::Url::parse(&self.url)?.join(reference)?.to_string())
    }
}

/// Sends one HTTP request to the system under test.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`] or [`TransportError::Connection`].
    async fn send(&self, request: OutboundRequest) -> Result<HttpExchange, TransportError>;
}

/// Creates one transport per scenario, so parallel scenarios never share a
/// cookie jar.
pub trait TransportFactory: Send + Sync {
    /// Creates a fresh transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    fn create(&self) -> Result<Box<dyn Transport>, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with a cookie store, no redirect following and the
    /// given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the TLS backend fails to
    /// initialise.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<HttpExchange, TransportError> {
        let url = request.url().to_string();
        let builder = match &request {
            OutboundRequest::Get { url } => self.client.get(url),
            OutboundRequest::PostForm { url, fields } => self.client.post(url).form(fields),
        };

        let response = builder.send().await.map_err(|e| classify(&url, &e))?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.map_err(|e| classify(&url, &e))?;

        tracing::debug!(method = request.method(), %url, status, "HTTP exchange");
        Ok(HttpExchange {
            url,
            status,
            location,
            body,
        })
    }
}

fn classify(url: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Factory for [`ReqwestTransport`].
#[derive(Debug, Clone, Copy)]
pub struct ReqwestTransportFactory {
    timeout: Duration,
}

impl ReqwestTransportFactory {
    /// Creates a factory whose transports use `timeout` per request.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(ReqwestTransport::new(self.timeout)?))
    }
}
