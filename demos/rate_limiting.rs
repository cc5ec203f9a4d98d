//! Shows how throttled calls are retried and what happens at the ceiling.
//!
//! Targets `https://httpbin.org/status/429` by default, which always
//! throttles. Point `STRATUS_THROTTLED_URL` elsewhere to try a real service.
//!
//! Run with: `cargo run --example rate_limiting`

use std::sync::Arc;
use std::time::Duration;

use stratus::diagnostics::RecordingDiagnostics;
use stratus::rate_limit::RateLimitConfig;
use stratus::{Backoff, Client, Error, JsonRequest, RetryPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("stratus=debug")
        .init();

    let url = std::env::var("STRATUS_THROTTLED_URL")
        .unwrap_or_else(|_| "https://httpbin.org/status/429".to_string());

    println!("=== Default policy ===");
    let policy = RetryPolicy::default();
    println!("up to {} attempts", policy.max_attempts);
    for retry in 1..policy.max_attempts {
        println!("  retry {retry} waits about {:?}", policy.backoff.delay_for_retry(retry));
    }
    println!();

    println!("=== Short ceiling with recorded diagnostics ===");
    let recorder = Arc::new(RecordingDiagnostics::default());
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .retry_policy(RetryPolicy::new(
            3,
            Backoff::Exponential {
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(2),
                jitter: true,
            },
        ))
        .rate_limit_config(
            RateLimitConfig::builder()
                .max_wait(Duration::from_secs(2))
                .build(),
        )
        .diagnostics(recorder.clone())
        .build()?;

    match client.json_request(http::Method::GET, &url, JsonRequest::new()).await {
        Ok(meta) => println!("succeeded after {} attempt(s)", meta.attempts),
        Err(Error::MaxRetriesExceeded { attempts, last_error }) => {
            println!("gave up after {attempts} attempts: {last_error}");
        }
        Err(e) => println!("failed: {e}"),
    }
    for message in recorder.messages() {
        println!("  {message}");
    }
    println!();

    println!("=== Retries disabled ===");
    let client = Client::builder().retry_policy(RetryPolicy::none()).build()?;
    match client.json_request(http::Method::GET, &url, JsonRequest::new()).await {
        Ok(_) => println!("not throttled"),
        Err(e) => println!("throttled: {}, status {:?}", e.is_throttled(), e.status()),
    }

    Ok(())
}
