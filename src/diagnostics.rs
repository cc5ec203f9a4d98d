//! Diagnostics emitted while a request is being retried.
//!
//! Retries are otherwise invisible to the caller, so the client reports each
//! one to a [`Diagnostics`] sink. The default sink logs through `tracing`;
//! [`RecordingDiagnostics`] keeps events in memory for inspection.

use http::{Method, StatusCode};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

/// A throttled attempt that is about to be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// Method of the request.
    pub method: Method,
    /// Full URL of the request.
    pub url: String,
    /// Status of the throttled response.
    pub status: StatusCode,
    /// The attempt that was throttled (1-indexed).
    pub attempt: usize,
    /// How long the client waits before the next attempt.
    pub delay: Duration,
    /// Whether `delay` came from the server rather than the backoff.
    pub hinted: bool,
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Too many requests, retrying in {:?} (attempt {}, {} {})",
            self.delay, self.attempt, self.method, self.url
        )
    }
}

/// Receives retry notices from the client.
///
/// # Examples
///
/// ```
/// use stratus::diagnostics::{Diagnostics, RetryEvent};
///
/// struct Stderr;
///
/// impl Diagnostics for Stderr {
///     fn retrying(&self, event: &RetryEvent) {
///         eprintln!("{event}");
///     }
/// }
/// ```
pub trait Diagnostics: Send + Sync {
    /// Called once per retry, before the client starts waiting.
    fn retrying(&self, event: &RetryEvent);
}

/// Logs retry notices as `tracing` warnings. This is the default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn retrying(&self, event: &RetryEvent) {
        tracing::warn!(
            method = %event.method,
            url = %event.url,
            status = event.status.as_u16(),
            attempt = event.attempt,
            delay_ms = event.delay.as_millis() as u64,
            hinted = event.hinted,
            "Too many requests, retrying in {:?}",
            event.delay
        );
    }
}

/// Keeps every retry notice in memory.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stratus::{diagnostics::RecordingDiagnostics, Client};
///
/// # fn example() -> Result<(), stratus::Error> {
/// let recorder = Arc::new(RecordingDiagnostics::default());
/// let client = Client::builder().diagnostics(recorder.clone()).build()?;
/// // ... make calls ...
/// for line in recorder.messages() {
///     println!("{line}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<RetryEvent>>,
}

impl RecordingDiagnostics {
    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<RetryEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded events rendered as log lines.
    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }

    /// Number of retries seen so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if no retry has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn retrying(&self, event: &RetryEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(attempt: usize) -> RetryEvent {
        RetryEvent {
            method: Method::POST,
            url: "http://compute/os-security-groups".to_string(),
            status: StatusCode::TOO_MANY_REQUESTS,
            attempt,
            delay: Duration::from_millis(250),
            hinted: false,
        }
    }

    #[test]
    fn test_recording_keeps_order() {
        let recorder = RecordingDiagnostics::default();
        assert!(recorder.is_empty());

        recorder.retrying(&event(1));
        recorder.retrying(&event(2));

        let attempts: Vec<_> = recorder.events().iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2]);
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            event(1).to_string(),
            "Too many requests, retrying in 250ms (attempt 1, POST http://compute/os-security-groups)"
        );
    }
}
