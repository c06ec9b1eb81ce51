//! Request/response model and fetch events.
//!
//! Defines the request descriptor dispatched by the host, the response
//! snapshot returned to it, and the injected network capability.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Default for RequestMethod {
    fn default() -> Self {
        Self::Get
    }
}

impl RequestMethod {
    /// Convert to the wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// An outgoing request as dispatched by the host.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: RequestMethod,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body (if any).
    pub body: Option<Vec<u8>>,
    /// Originating client context (if the host knows it).
    pub client_id: Option<String>,
}

impl Request {
    /// Create a GET request for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            client_id: None,
        }
    }

    /// Tag the request with its originating client context.
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }
}

/// A response snapshot: status, headers, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL the response was produced for.
    pub url: String,
    /// Status code.
    pub status: u16,
    /// Status text.
    pub status_text: String,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Option<Vec<u8>>,
}

impl Response {
    /// Create a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            url: String::new(),
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Check if the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Get status text for a status code.
fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Network fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network could not be reached for the given URL.
    Unreachable(String),
    /// The host tore down the requesting context mid-flight.
    Aborted(String),
}

/// The network fetch capability.
///
/// Injected into the proxy by the host. Given a request descriptor it
/// returns a response or fails; no retries, no caching of its own.
pub trait NetworkBackend: Send + Sync {
    /// Perform a network fetch.
    fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// A dispatched fetch occurrence.
///
/// Owns the request and records at most one response; the first
/// `respond_with` wins.
#[derive(Debug)]
pub struct FetchEvent {
    request: Request,
    response: Option<Response>,
    responded: bool,
}

impl FetchEvent {
    /// Create a fetch event for a request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            responded: false,
        }
    }

    /// Get the request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Check if a response was recorded.
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Record the response. Later calls are ignored.
    pub fn respond_with(&mut self, response: Response) {
        if !self.responded {
            self.responded = true;
            self.response = Some(response);
        }
    }

    /// Take the recorded response out of the event.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}
