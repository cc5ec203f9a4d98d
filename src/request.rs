//! Request descriptors.
//!
//! A call is described by one of two types, depending on how its body is
//! encoded: [`JsonRequest`] serializes a value and decodes the response into
//! a typed destination, [`BinaryRequest`] moves raw bytes in both directions.
//! Both share [`RequestOptions`].

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// Options shared by every request: headers, query parameters and accepted statuses.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Additional headers. A name may appear more than once.
    pub headers: HeaderMap,

    /// Query parameters, appended to the URL in order. A key may repeat.
    pub params: Vec<(String, String)>,

    /// Statuses that count as success. Empty means `200 OK` only.
    pub expected_status: Vec<StatusCode>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, keeping any existing values for the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Appends a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends several query parameters.
    pub fn params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    /// Sets the statuses that count as success.
    pub fn expect_status(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.expected_status = statuses.into_iter().collect();
        self
    }
}

/// A request with a JSON body and a JSON response.
///
/// The builder methods change the type parameters, so the body and
/// destination types are inferred from what is passed in.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use serde::{Deserialize, Serialize};
/// use stratus::{JsonRequest, RequestOptions};
///
/// #[derive(Serialize)]
/// struct CreateGroup<'a> { name: &'a str }
///
/// #[derive(Deserialize, Default)]
/// struct Group { id: u64 }
///
/// let mut group = Group::default();
/// let request = JsonRequest::with_options(RequestOptions::new().expect_status([StatusCode::CREATED]))
///     .body(&CreateGroup { name: "web" })
///     .response(&mut group);
/// # let _ = request;
/// ```
#[derive(Debug)]
pub struct JsonRequest<'a, Req: ?Sized = (), Res = ()> {
    /// Headers, query and accepted statuses.
    pub options: RequestOptions,
    /// Value to send, encoded as JSON.
    pub body: Option<&'a Req>,
    /// Where to decode a non-empty success body.
    pub response: Option<&'a mut Res>,
}

impl<'a> JsonRequest<'a> {
    /// Creates a request with default options, no body and no destination.
    pub fn new() -> Self {
        Self::with_options(RequestOptions::default())
    }

    /// Creates a request with the given options, no body and no destination.
    pub fn with_options(options: RequestOptions) -> Self {
        Self {
            options,
            body: None,
            response: None,
        }
    }
}

impl Default for JsonRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, Req: ?Sized, Res> JsonRequest<'a, Req, Res> {
    /// Sets the value to send.
    pub fn body<B: ?Sized>(self, body: &'a B) -> JsonRequest<'a, B, Res> {
        JsonRequest {
            options: self.options,
            body: Some(body),
            response: self.response,
        }
    }

    /// Sets the destination for the decoded response.
    pub fn response<R>(self, response: &'a mut R) -> JsonRequest<'a, Req, R> {
        JsonRequest {
            options: self.options,
            body: self.body,
            response: Some(response),
        }
    }

    /// Replaces the request options.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// A request with an opaque byte body and an opaque byte response.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use stratus::{BinaryRequest, RequestOptions};
///
/// let upload = BinaryRequest::with_options(RequestOptions::new().expect_status([StatusCode::CREATED]))
///     .body(b"hello".to_vec());
///
/// let mut contents = Vec::new();
/// let download = BinaryRequest::new().response(&mut contents);
/// # let _ = (upload, download);
/// ```
#[derive(Debug, Default)]
pub struct BinaryRequest<'a> {
    /// Headers, query and accepted statuses.
    pub options: RequestOptions,
    /// Bytes to send as-is.
    pub body: Option<Bytes>,
    /// Where to copy a non-empty success body.
    pub response: Option<&'a mut Vec<u8>>,
}

impl<'a> BinaryRequest<'a> {
    /// Creates a request with default options, no body and no destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request with the given options, no body and no destination.
    pub fn with_options(options: RequestOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Sets the bytes to send.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the destination for the response bytes.
    pub fn response(mut self, response: &'a mut Vec<u8>) -> Self {
        self.response = Some(response);
        self
    }

    /// Replaces the request options.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), crate::Error> {
    let name = HeaderName::try_from(name)
        .map_err(|e| crate::Error::ConfigurationError(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| crate::Error::ConfigurationError(format!("invalid value for header {name}: {e}")))?;
    Ok((name, value))
}

pub(crate) const JSON: &str = "application/json";
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

/// The encoded body handed to the dispatcher.
#[derive(Debug)]
pub(crate) enum Payload {
    Json(Option<Bytes>),
    Binary(Option<Bytes>),
    /// Consumed by the first attempt.
    Stream(Option<reqwest::Body>),
}

impl Payload {
    pub(crate) fn content_type(&self) -> &'static str {
        match self {
            Payload::Json(_) => JSON,
            Payload::Binary(_) | Payload::Stream(_) => OCTET_STREAM,
        }
    }

    pub(crate) fn bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Json(body) | Payload::Binary(body) => body.as_ref(),
            Payload::Stream(_) => None,
        }
    }

    /// The body to send with the next attempt.
    pub(crate) fn next_body(&mut self) -> Option<reqwest::Body> {
        match self {
            Payload::Json(body) | Payload::Binary(body) => body.clone().map(reqwest::Body::from),
            Payload::Stream(body) => body.take(),
        }
    }

    /// Whether the body can be sent again after a throttled attempt.
    pub(crate) fn is_replayable(&self) -> bool {
        !matches!(self, Payload::Stream(_))
    }

    /// Lossy text rendering of the body for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Payload::Stream(_) => "<streamed>".to_string(),
            _ => self
                .bytes()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default(),
        }
    }
}
