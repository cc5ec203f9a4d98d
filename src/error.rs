//! Error types for API calls.
//!
//! Every failure crossing the client boundary is an [`Error`]. Variants carry
//! a short description of what failed and keep the underlying cause reachable
//! through [`std::error::Error::source`], so nothing is discarded on the way
//! out. Non-success responses carry an [`ErrorDetail`] extracted from the
//! response body.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use std::fmt;

/// The structured error payload returned by the services.
///
/// Decoded from a JSON body of the form
/// `{"error": {"message": "...", "code": 413, "title": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    /// Human readable description of the failure.
    #[serde(default)]
    pub message: String,
    /// Numeric error code, usually mirroring the HTTP status.
    #[serde(default)]
    pub code: i64,
    /// Short title such as `"Over Limit"`.
    #[serde(default)]
    pub title: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed: {} {}: {}", self.code, self.title, self.message)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorResponse,
}

/// What a failed response said about the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// The response carried a recognised JSON error envelope.
    Structured(ErrorResponse),
    /// Anything else: the response body, verbatim.
    Raw(Bytes),
}

impl ErrorDetail {
    /// Extracts the error detail from a non-success response body.
    ///
    /// The structured envelope is only attempted when `content_type` names
    /// `application/json` (parameters such as `charset` are ignored). Any
    /// decode failure falls back to [`ErrorDetail::Raw`]; this never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratus::ErrorDetail;
    ///
    /// let body = br#"{"error":{"message":"quota exceeded","code":413,"title":"Over Limit"}}"#;
    /// match ErrorDetail::extract(body, Some("application/json")) {
    ///     ErrorDetail::Structured(e) => assert_eq!(e.title, "Over Limit"),
    ///     other => panic!("unexpected {other:?}"),
    /// }
    ///
    /// let raw = ErrorDetail::extract(b"boom", Some("text/plain"));
    /// assert_eq!(raw.to_string(), "boom");
    /// ```
    pub fn extract(body: &[u8], content_type: Option<&str>) -> Self {
        if content_type.is_some_and(is_json) {
            if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
                return ErrorDetail::Structured(envelope.error);
            }
        }
        ErrorDetail::Raw(Bytes::copy_from_slice(body))
    }

    /// Returns the structured payload, if one was decoded.
    pub fn structured(&self) -> Option<&ErrorResponse> {
        match self {
            ErrorDetail::Structured(e) => Some(e),
            ErrorDetail::Raw(_) => None,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::Structured(e) => e.fmt(f),
            ErrorDetail::Raw(body) => f.write_str(&String::from_utf8_lossy(body)),
        }
    }
}

/// Returns `true` if the media type of `content_type` is `application/json`.
pub(crate) fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case("application/json"))
}

/// The main error type for API calls.
///
/// # Examples
///
/// ```no_run
/// use stratus::{Client, Error, ErrorDetail, JsonRequest};
/// use http::Method;
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().auth_token("secret").build()?;
/// let mut servers = serde_json::Value::Null;
///
/// let request = JsonRequest::new().response(&mut servers);
/// match client.json_request(Method::GET, "https://compute.example.com/servers", request).await {
///     Ok(_) => println!("servers: {servers}"),
///     Err(e) => match e.error_detail() {
///         Some(ErrorDetail::Structured(detail)) => eprintln!("{}: {}", detail.title, detail.message),
///         _ => eprintln!("call failed: {e}"),
///     },
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be sent: connection refused, DNS failure and so on.
    ///
    /// Transport failures are never retried.
    #[error("failed executing the request ({url}): {source}")]
    Transport {
        /// The URL that was being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The transport gave up waiting for the server.
    #[error("request ({url}) timed out: {source}")]
    Timeout {
        /// The URL that was being requested.
        url: String,
        /// The transport's timeout error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read in full.
    #[error("failed reading the response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// The server answered with a status the caller did not accept.
    ///
    /// `request_body` is a copy of the outgoing payload, for diagnostics.
    #[error(
        "request ({url}) returned unexpected status: {status}; error info: {detail}; request body: {request_body}"
    )]
    UnexpectedStatus {
        /// The full request URL, including query.
        url: String,
        /// The response status.
        status: StatusCode,
        /// Error information extracted from the response body.
        detail: ErrorDetail,
        /// The response headers.
        headers: Box<HeaderMap>,
        /// The outgoing payload, lossily rendered as text.
        request_body: String,
    },

    /// The server kept throttling until the retry ceiling was reached.
    #[error("giving up after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made.
        attempts: usize,
        /// The error produced by the final response.
        #[source]
        last_error: Box<Error>,
    },

    /// The request body could not be encoded as JSON.
    #[error("failed marshalling the request body: {0}")]
    SerializationFailed(#[source] serde_json::Error),

    /// The response body did not match the destination type.
    #[error("failed unmarshalling the response body (status {status}): {raw_response}")]
    DeserializationFailed {
        /// The raw response body.
        raw_response: String,
        /// The response status.
        status: StatusCode,
        /// The decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration: bad header, unknown service, client build failure.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A lower-level error annotated by the operation that hit it.
    #[error("{context}: {source}")]
    Context {
        /// What the caller was doing.
        context: String,
        /// What went wrong.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with a short description of the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping `Context` and `MaxRetriesExceeded` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.root(),
            other => other,
        }
    }

    /// Returns the response status, if the failure came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.root() {
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the error detail extracted from a non-success response.
    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        match self.root() {
            Error::UnexpectedStatus { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// Returns the raw response body for decode failures and raw error details.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self.root() {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response.as_bytes()),
            Error::UnexpectedStatus {
                detail: ErrorDetail::Raw(body),
                ..
            } => Some(body),
            _ => None,
        }
    }

    /// Returns `true` if the server throttled the final attempt.
    pub fn is_throttled(&self) -> bool {
        matches!(self.root(), Error::UnexpectedStatus { status, headers, .. }
            if crate::rate_limit::is_throttle_signal(*status, headers))
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;
