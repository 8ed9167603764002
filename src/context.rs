//! Per-request snapshot that log tags are resolved against.

use axum::{
    extract::{ConnectInfo, OriginalUri},
    http::{
        HeaderMap, Method, StatusCode, Uri, Version, header, request, response,
    },
    response::{IntoResponseParts, Response, ResponseParts},
};
use std::{convert::Infallible, fmt, net::SocketAddr, sync::Arc, time::Instant};

/// Header carrying the request id, on the request or the response.
pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// An error a handler wants to appear in the `${error}` tag.
///
/// Handlers attach it to their response; the logging middleware reads it
/// back from the response extensions. The response itself is left as is.
///
/// ```ignore
/// Err((StatusCode::BAD_GATEWAY, LoggedError::new(&err), "upstream failed"))
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedError(Arc<str>);

impl LoggedError {
    pub fn new(err: impl fmt::Display) -> Self {
        Self(err.to_string().into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }

    /// Stores this error in the extensions of `response`.
    pub fn attach(self, mut response: Response) -> Response {
        response.extensions_mut().insert(self);
        response
    }
}

impl fmt::Display for LoggedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoResponseParts for LoggedError {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Response side of the snapshot, filled in when the response is finalized.
#[derive(Debug, Clone)]
struct ResponseSnapshot {
    status: StatusCode,
    headers: HeaderMap,
    bytes_out: u64,
    error: Option<LoggedError>,
}

impl Default for ResponseSnapshot {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            bytes_out: 0,
            error: None,
        }
    }
}

/// Everything a log line can say about one request/response cycle.
///
/// A context is built by the middleware for exactly one request and moved
/// into that request's finalize hook, so concurrent requests never share one.
/// Until [`RenderContext::set_response`] is called the response reads as a
/// `200` with no headers and no bytes written.
#[derive(Debug, Clone)]
pub struct RenderContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    form: Vec<(String, String)>,
    start: Instant,
    response: ResponseSnapshot,
}

impl RenderContext {
    /// Snapshots the request head. The URI seen before any router nesting
    /// is preferred when axum recorded one.
    pub fn new(parts: &request::Parts, start: Instant) -> Self {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Self {
            method: parts.method.clone(),
            uri,
            version: parts.version,
            headers: parts.headers.clone(),
            remote_addr,
            form: Vec::new(),
            start,
            response: ResponseSnapshot::default(),
        }
    }

    /// Sets form fields decoded from the request body.
    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Records the response head and any [`LoggedError`] the handler attached.
    pub fn set_response(&mut self, parts: &response::Parts) {
        self.response.status = parts.status;
        self.response.headers = parts.headers.clone();
        self.response.error = parts.extensions.get::<LoggedError>().cloned();
    }

    pub fn set_bytes_out(&mut self, bytes: u64) {
        self.response.bytes_out = bytes;
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn bytes_out(&self) -> u64 {
        self.response.bytes_out
    }

    pub fn error(&self) -> Option<&LoggedError> {
        self.response.error.as_ref()
    }

    /// The `Host` header, falling back to the URI authority.
    pub fn host(&self) -> &str {
        self.headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| self.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or_default()
    }

    /// The request target: path plus query.
    pub fn request_uri(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            path => path,
        }
    }

    pub fn protocol(&self) -> String {
        format!("{:?}", self.version)
    }

    /// The first value of a request header, as raw bytes.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers.get(name).map(|value| value.as_bytes())
    }

    /// Request id from the request, then from the response.
    pub fn request_id(&self) -> Option<&[u8]> {
        self.header(X_REQUEST_ID)
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.response
                    .headers
                    .get(X_REQUEST_ID)
                    .map(|value| value.as_bytes())
            })
    }

    /// Declared request body size, `"0"` when absent.
    pub fn bytes_in(&self) -> &[u8] {
        self.header(header::CONTENT_LENGTH.as_str())
            .filter(|len| !len.is_empty())
            .unwrap_or(b"0")
    }

    /// Client address, honouring proxy headers before the peer address.
    pub fn real_ip(&self) -> String {
        if let Some(forwarded) = self.header_str(X_FORWARDED_FOR) {
            let first = forwarded.split(',').next().unwrap_or(forwarded);
            return strip_brackets(first.trim()).to_string();
        }
        if let Some(real_ip) = self.header_str(X_REAL_IP) {
            return strip_brackets(real_ip).to_string();
        }
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// A form field: body fields win over query parameters.
    pub fn form_value(&self, name: &str) -> Option<String> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.query_param(name))
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| {
                let value = value.trim();
                value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value)
            })
    }
}

fn strip_brackets(ip: &str) -> &str {
    let ip = ip.strip_prefix('[').unwrap_or(ip);
    ip.strip_suffix(']').unwrap_or(ip)
}
