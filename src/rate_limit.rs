//! Throttling detection and server-suggested retry delays.
//!
//! Services under load answer with `429 Too Many Requests`, or with the
//! compute API's over-limit form, `413` plus a `Retry-After` header. This
//! module recognises both and parses the delay hints that accompany them.

use http::{header::RETRY_AFTER, HeaderMap, StatusCode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Returns `true` if a response asks the caller to slow down and retry later.
///
/// # Examples
///
/// ```
/// use http::{HeaderMap, HeaderValue, StatusCode};
/// use stratus::rate_limit::is_throttle_signal;
///
/// let mut headers = HeaderMap::new();
/// assert!(is_throttle_signal(StatusCode::TOO_MANY_REQUESTS, &headers));
/// assert!(!is_throttle_signal(StatusCode::PAYLOAD_TOO_LARGE, &headers));
///
/// headers.insert("retry-after", HeaderValue::from_static("5"));
/// assert!(is_throttle_signal(StatusCode::PAYLOAD_TOO_LARGE, &headers));
/// ```
pub fn is_throttle_signal(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::PAYLOAD_TOO_LARGE => headers.contains_key(RETRY_AFTER),
        _ => false,
    }
}

/// What a throttled response says about when to come back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleHint {
    /// Wait requested through `Retry-After`, either as seconds or as a date.
    pub retry_after: Option<Duration>,

    /// End of the current quota window, from `X-RateLimit-Reset` or `RateLimit-Reset`.
    pub reset_at: Option<SystemTime>,

    /// Calls left in the current window, from `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,
}

impl ThrottleHint {
    /// Reads the hint headers of a response. Unparsable values are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::{HeaderMap, HeaderValue};
    /// use stratus::rate_limit::ThrottleHint;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", HeaderValue::from_static("60"));
    /// headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    ///
    /// let hint = ThrottleHint::from_headers(&headers);
    /// assert_eq!(hint.retry_after, Some(Duration::from_secs(60)));
    /// assert_eq!(hint.remaining, Some(0));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let retry_after = header_text(headers, RETRY_AFTER.as_str()).and_then(parse_retry_after);
        let reset_at = RESET_HEADERS
            .iter()
            .find_map(|name| {
                let epoch = header_text(headers, name)?.parse::<u64>().ok()?;
                UNIX_EPOCH.checked_add(Duration::from_secs(epoch))
            });
        let remaining = header_text(headers, REMAINING_HEADER).and_then(|v| v.parse().ok());

        Self {
            retry_after,
            reset_at,
            remaining,
        }
    }

    /// Returns `true` unless the server reports calls left in the current window.
    pub fn window_exhausted(&self) -> bool {
        !matches!(self.remaining, Some(n) if n > 0)
    }

    /// The wait this hint asks for, no longer than `max_wait`.
    ///
    /// An explicit `Retry-After` takes precedence over the window reset. The
    /// reset only counts while the window is exhausted, and a reset that has
    /// already passed gives no delay at all.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        let wanted = match (self.retry_after, self.reset_at) {
            (Some(retry_after), _) => retry_after,
            (None, Some(reset_at)) if self.window_exhausted() => {
                reset_at.duration_since(SystemTime::now()).ok()?
            }
            _ => return None,
        };
        Some(wanted.min(max_wait))
    }
}

/// How the client treats server-provided delay hints.
///
/// # Examples
///
/// ```
/// use stratus::rate_limit::RateLimitConfig;
/// use std::time::Duration;
///
/// let config = RateLimitConfig::builder()
///     .max_wait(Duration::from_secs(120))
///     .build();
/// assert!(config.respect_retry_after);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Upper bound on a single server-suggested wait. Defaults to 5 minutes.
    pub max_wait: Duration,

    /// Whether to honour delay hints at all. When `false` the retry policy's
    /// backoff is used for every throttled attempt. Defaults to `true`.
    pub respect_retry_after: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(5 * 60),
            respect_retry_after: true,
        }
    }
}

impl RateLimitConfig {
    /// Starts from the defaults.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder {
            config: Self::default(),
        }
    }

    /// Returns the hinted delay for a throttled response, if it should be used.
    pub(crate) fn hinted_delay(&self, headers: &HeaderMap) -> Option<Duration> {
        self.respect_retry_after
            .then(|| ThrottleHint::from_headers(headers).delay(self.max_wait))
            .flatten()
    }
}

/// Builder for [`RateLimitConfig`].
#[derive(Debug, Clone)]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    /// Caps any single hinted wait.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    /// Turns hint handling on or off.
    pub fn respect_retry_after(mut self, respect: bool) -> Self {
        self.config.respect_retry_after = respect;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

fn header_text<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    Some(headers.get(name)?.to_str().ok()?.trim())
}

/// `Retry-After` is either delay-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = httpdate::parse_http_date(value).ok()?;
    // past dates mean "now"
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_retry_after_forms() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("soon"), None);

        let when = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(30));
        let delay = parse_retry_after(&when).unwrap();
        assert!(delay <= Duration::from_secs(30));
        assert!(delay >= Duration::from_secs(28), "got {delay:?}");

        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_window_reset_used_without_retry_after() {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 120;
        let hint = ThrottleHint::from_headers(&headers(&[
            ("ratelimit-reset", &epoch.to_string()),
            ("x-ratelimit-remaining", "0"),
        ]));

        assert!(hint.retry_after.is_none());
        assert_eq!(hint.remaining, Some(0));

        let delay = hint.delay(Duration::from_secs(300)).unwrap();
        assert!(delay > Duration::from_secs(100) && delay <= Duration::from_secs(120));
    }

    #[test]
    fn test_expired_reset_gives_no_delay() {
        let hint = ThrottleHint::from_headers(&headers(&[("x-ratelimit-reset", "1000")]));
        assert!(hint.reset_at.is_some());
        assert_eq!(hint.delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn test_out_of_range_reset_is_ignored() {
        let hint = ThrottleHint::from_headers(&headers(&[
            ("x-ratelimit-reset", "18446744073709551615"),
            ("x-ratelimit-remaining", "0"),
        ]));

        assert_eq!(hint.reset_at, None);
        assert_eq!(hint.delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn test_reset_ignored_while_calls_remain() {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 60;
        let hint = ThrottleHint::from_headers(&headers(&[
            ("x-ratelimit-reset", &epoch.to_string()),
            ("x-ratelimit-remaining", "12"),
        ]));

        assert!(!hint.window_exhausted());
        assert_eq!(hint.delay(Duration::from_secs(300)), None);

        let hint = ThrottleHint {
            remaining: Some(12),
            retry_after: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        assert_eq!(hint.delay(Duration::from_secs(300)), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_delay_capped_by_max_wait() {
        let hint = ThrottleHint {
            retry_after: Some(Duration::from_secs(600)),
            ..Default::default()
        };

        assert_eq!(
            hint.delay(Duration::from_secs(300)),
            Some(Duration::from_secs(300))
        );
        assert_eq!(ThrottleHint::default().delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn test_hints_can_be_ignored() {
        let headers = headers(&[("retry-after", "10")]);

        let config = RateLimitConfig::default();
        assert_eq!(config.hinted_delay(&headers), Some(Duration::from_secs(10)));

        let config = RateLimitConfig::builder().respect_retry_after(false).build();
        assert_eq!(config.hinted_delay(&headers), None);
    }

    #[test]
    fn test_throttle_signals() {
        let mut headers = HeaderMap::new();
        assert!(is_throttle_signal(StatusCode::TOO_MANY_REQUESTS, &headers));
        assert!(!is_throttle_signal(StatusCode::PAYLOAD_TOO_LARGE, &headers));
        assert!(!is_throttle_signal(StatusCode::SERVICE_UNAVAILABLE, &headers));

        headers.insert("retry-after", HeaderValue::from_static("1"));
        assert!(is_throttle_signal(StatusCode::PAYLOAD_TOO_LARGE, &headers));
        assert!(!is_throttle_signal(StatusCode::BAD_REQUEST, &headers));
    }
}
