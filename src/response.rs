//! Metadata describing a successful exchange.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A response body delivered chunk by chunk as it arrives.
pub type ByteStream = BoxStream<'static, crate::Result<Bytes>>;

/// What the client observed about a successful call.
///
/// The decoded body goes to the destination in the request; this carries
/// everything else.
///
/// # Examples
///
/// ```no_run
/// use stratus::{Client, JsonRequest};
/// use http::Method;
///
/// # async fn example() -> Result<(), stratus::Error> {
/// let client = Client::builder().build()?;
/// let mut flavors = serde_json::Value::Null;
///
/// let meta = client
///     .json_request(Method::GET, "https://compute.example.com/flavors", JsonRequest::new().response(&mut flavors))
///     .await?;
///
/// println!("{} after {} attempt(s) in {:?}", meta.status, meta.attempts, meta.latency);
/// if meta.was_retried() {
///     println!("the service was throttling us");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt being sent until the body was read,
    /// including any retry waits.
    pub latency: Duration,

    /// Number of attempts made; `1` when no retry was needed.
    pub attempts: usize,
}

impl ResponseMeta {
    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid text.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stratus::ResponseMeta;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("etag", HeaderValue::from_static("d41d8cd9"));
    ///
    /// let meta = ResponseMeta {
    ///     status: StatusCode::OK,
    ///     headers,
    ///     latency: Duration::from_millis(12),
    ///     attempts: 1,
    /// };
    ///
    /// assert_eq!(meta.header("etag"), Some("d41d8cd9"));
    /// assert!(!meta.was_retried());
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
