use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, Proxy, header};
use thiserror::Error;
use url::{Url, form_urlencoded};

use crate::{
    config::TransportConfig,
    error::{ConfigError, Result},
};

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` fields, possibly empty
    Form(Vec<(String, String)>),
    /// Raw payload with its media type
    Content { content_type: String, data: Vec<u8> },
}

impl RequestBody {
    pub fn content_type(&self) -> &str {
        match self {
            RequestBody::Form(_) => "application/x-www-form-urlencoded",
            RequestBody::Content { content_type, .. } => content_type,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Form(fields) => form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
                .into_bytes(),
            RequestBody::Content { data, .. } => data.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RequestBody::Form(fields) => fields.iter().map(|(k, v)| k.len() + v.len() + 2).sum(),
            RequestBody::Content { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of a form field, if this is a form body.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match self {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            RequestBody::Content { .. } => None,
        }
    }
}

/// Transport-independent description of one HTTP exchange.
///
/// `path` is relative to the transport's base URL. A query parameter with an
/// empty value is sent as a bare key (`?default`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub accept: Option<String>,
    pub body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            accept: None,
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Encoded query string, without the leading `?`.
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let encoded = self
            .query
            .iter()
            .map(|(key, value)| {
                let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
                if value.is_empty() {
                    key
                } else {
                    let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                    format!("{key}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        Some(encoded)
    }

    /// Resolve against `base`. An empty path addresses `base` itself.
    pub fn url(&self, base: &Url) -> std::result::Result<Url, url::ParseError> {
        let mut url = if self.path.is_empty() {
            base.clone()
        } else if base.path().ends_with('/') {
            base.join(&self.path)?
        } else {
            let mut directory = base.clone();
            directory.set_path(&format!("{}/", base.path()));
            directory.join(&self.path)?
        };
        url.set_query(self.query_string().as_deref());
        Ok(url)
    }
}

/// HTTP response as seen by the connectors
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub content_type: Option<String>,
    /// Declared `Content-Length`, when present
    pub content_length: Option<u64>,
    /// Response body, or the error hit while reading it
    pub body: std::result::Result<Vec<u8>, String>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            reason: canonical_reason(status),
            content_type: content_type.map(str::to_string),
            content_length: Some(body.len() as u64),
            body: Ok(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body bytes, or an empty slice when the body could not be read.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(self.body_bytes()).into_owned()
    }
}

pub(crate) fn canonical_reason(status: u16) -> Option<String> {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
}

/// Failure classes for requests that produced no HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Request,
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else if error.is_request() || error.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// Executes request descriptors against a store.
///
/// Non-success statuses are returned as responses, never as errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging/debugging
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        request: RequestDescriptor,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport with pooled connections and optional basic auth
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        credentials: Option<(&str, &str)>,
        config: &TransportConfig,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .connect_timeout(config.timeouts.connect_timeout())
            .timeout(config.timeouts.request_timeout());

        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|e| {
                ConfigError::InvalidConfig(format!("transport.proxy '{proxy}' is invalid: {e}"))
            })?;
            builder = builder.proxy(proxy);
        }
        if config.accept_invalid_certs {
            tracing::warn!(base_url = %base_url, "TLS certificate validation disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            ConfigError::InvalidConfig(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            credentials: credentials.map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

pub(crate) fn normalize_base_url(base_url: &str) -> std::result::Result<Url, ConfigError> {
    Url::parse(base_url)
        .map_err(|e| ConfigError::InvalidConfig(format!("url '{base_url}' is invalid: {e}")))
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn execute(
        &self,
        request: RequestDescriptor,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = request
            .url(&self.base_url)
            .map_err(|e| TransportError::new(TransportErrorKind::Request, e.to_string()))?;

        let mut builder = self.client.request(request.method.clone(), url);
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(header::CONTENT_TYPE, body.content_type())
                .body(body.to_bytes());
        }

        let response = builder.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();
        let body = match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) if status.is_success() => return Err(e.into()),
            Err(e) => Err(e.to_string()),
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            content_type,
            content_length,
            body,
        })
    }
}
