//! # Stratus - a client for tenant-scoped cloud APIs
//!
//! Stratus talks to token-authenticated compute, object-storage and identity
//! services over HTTP. Every call goes through one pipeline that encodes the
//! request, attaches the auth token, checks the response status against what
//! the caller accepts, and decodes the result. Throttled requests are retried
//! transparently, up to a ceiling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use http::{Method, StatusCode};
//! use serde::{Deserialize, Serialize};
//! use stratus::{Client, JsonRequest, RequestOptions};
//!
//! #[derive(Serialize)]
//! struct Keypair<'a> {
//!     name: &'a str,
//! }
//!
//! #[derive(Deserialize, Default)]
//! struct Created {
//!     keypair: serde_json::Value,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratus::Error> {
//!     let client = Client::builder()
//!         .auth_token("gAAAAABk...")
//!         .endpoint("compute", "https://compute.example.com/v2/tenant")?
//!         .build()?;
//!
//!     let url = client.service_url("compute", "os-keypairs")?;
//!     let mut created = Created::default();
//!     let request = JsonRequest::with_options(RequestOptions::new().expect_status([StatusCode::OK]))
//!         .body(&Keypair { name: "deploy" })
//!         .response(&mut created);
//!
//!     let meta = client.json_request(Method::POST, &url, request).await?;
//!     println!("created {} in {:?}", created.keypair, meta.latency);
//!     Ok(())
//! }
//! ```
//!
//! ## Binary payloads
//!
//! Object data travels as raw bytes through [`Client::binary_request`]; the
//! response bytes land in the destination untouched.
//!
//! ## Errors
//!
//! A rejected status produces [`Error::UnexpectedStatus`] with the request
//! URL, the status, the outgoing payload and an [`ErrorDetail`]: either the
//! decoded `{"error": {"message", "code", "title"}}` envelope or the raw body.
//!
//! ```no_run
//! use stratus::{Client, Error, ErrorDetail};
//!
//! # async fn example(client: Client) {
//! match client.get_json::<serde_json::Value>("https://compute.example.com/v2/tenant/servers").await {
//!     Ok(servers) => println!("{servers}"),
//!     Err(e) => match e.error_detail() {
//!         Some(ErrorDetail::Structured(detail)) => eprintln!("{} ({})", detail.message, detail.code),
//!         Some(ErrorDetail::Raw(body)) => eprintln!("raw error: {}", String::from_utf8_lossy(body)),
//!         None => eprintln!("call failed: {e}"),
//!     },
//! }
//! # }
//! ```
//!
//! ## Throttling
//!
//! A `429`, or a `413` with `Retry-After`, is retried after the server's
//! suggested delay or, without one, after the [`Backoff`] of the client's
//! [`RetryPolicy`]. Each retry is reported to the configured
//! [`diagnostics::Diagnostics`] sink, which logs through `tracing` by default.

mod client;
pub mod diagnostics;
mod error;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
pub mod services;
pub mod status;

pub use client::{Client, ClientBuilder, AUTH_TOKEN_HEADER};
pub use error::{Error, ErrorDetail, ErrorResponse, Result};
pub use request::{BinaryRequest, JsonRequest, RequestOptions};
pub use response::{ByteStream, ResponseMeta};
pub use retry::{Backoff, RetryPolicy};
