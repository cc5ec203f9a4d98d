//! HTTP client with token injection, status validation and throttling-aware retries.
//!
//! The [`Client`] type is the single path every service call goes through.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    diagnostics::{Diagnostics, RetryEvent, TracingDiagnostics},
    rate_limit::{is_throttle_signal, RateLimitConfig},
    request::{parse_header, BinaryRequest, JsonRequest, Payload, RequestOptions},
    retry::RetryPolicy,
    status, ByteStream, Error, ErrorDetail, ResponseMeta, Result,
};
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, Method,
};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Header carrying the auth token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// A client for the compute, object-storage and identity APIs of one tenant.
///
/// The client is cheap to clone and is meant to be shared. It holds the auth
/// token, the endpoint table and the retry configuration; every request made
/// through it is validated, retried when throttled, and decoded the same way.
///
/// # Examples
///
/// ```no_run
/// use http::{Method, StatusCode};
/// use serde::{Deserialize, Serialize};
/// use stratus::{Backoff, Client, JsonRequest, RequestOptions, RetryPolicy};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct NewGroup<'a> { name: &'a str, description: &'a str }
///
/// #[derive(Deserialize, Default)]
/// struct Created { security_group: serde_json::Value }
///
/// # async fn example() -> Result<(), stratus::Error> {
/// let client = Client::builder()
///     .auth_token("gAAAAABk...")
///     .endpoint("compute", "https://compute.example.com/v2/tenant")?
///     .retry_policy(RetryPolicy::new(4, Backoff::Fixed(Duration::from_secs(2))))
///     .build()?;
///
/// let url = client.service_url("compute", "os-security-groups")?;
/// let mut created = Created::default();
/// let request = JsonRequest::with_options(RequestOptions::new().expect_status([StatusCode::OK]))
///     .body(&NewGroup { name: "web", description: "web tier" })
///     .response(&mut created);
///
/// client.json_request(Method::POST, &url, request).await?;
/// println!("{}", created.security_group);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    auth_token: RwLock<Option<String>>,
    endpoints: HashMap<String, Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    rate_limit_config: RateLimitConfig,
    diagnostics: Arc<dyn Diagnostics>,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the current auth token, if any.
    pub fn auth_token(&self) -> Option<String> {
        self.inner.auth_token.read().clone()
    }

    /// Replaces the auth token. `None` or an empty string stops sending the header.
    ///
    /// Requests already in flight keep the token they started with.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.inner.auth_token.write() = token.filter(|t| !t.is_empty());
    }

    /// Builds the URL of `path` under the endpoint registered for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is registered under that name.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn example() -> Result<(), stratus::Error> {
    /// let client = stratus::Client::builder()
    ///     .endpoint("object-store", "https://swift.example.com/v1/AUTH_tenant")?
    ///     .build()?;
    ///
    /// assert_eq!(
    ///     client.service_url("object-store", "/backups/db.tar")?,
    ///     "https://swift.example.com/v1/AUTH_tenant/backups/db.tar"
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn service_url(&self, service: &str, path: &str) -> Result<String> {
        let base = self.inner.endpoints.get(service).ok_or_else(|| {
            Error::ConfigurationError(format!("no endpoint configured for service '{service}'"))
        })?;
        let base = base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}"))
    }

    /// Sends a JSON request and decodes a JSON response.
    ///
    /// The body, if any, is encoded before anything is sent. On success a
    /// non-empty response body is decoded into the request's destination,
    /// replacing its previous value; with no destination or an empty body the
    /// destination is left as it was.
    ///
    /// # Errors
    ///
    /// - [`Error::SerializationFailed`] if the body cannot be encoded.
    /// - [`Error::InvalidUrl`] if `url` does not parse.
    /// - [`Error::Transport`] / [`Error::Timeout`] if the request could not be completed.
    /// - [`Error::UnexpectedStatus`] if the status is not accepted, wrapped in
    ///   [`Error::MaxRetriesExceeded`] when the server was still throttling.
    /// - [`Error::DeserializationFailed`] if the body does not fit the destination.
    pub async fn json_request<Req, Res>(
        &self,
        method: Method,
        url: &str,
        request: JsonRequest<'_, Req, Res>,
    ) -> Result<ResponseMeta>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let JsonRequest {
            options,
            body,
            response,
        } = request;

        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(Error::SerializationFailed)?
            .map(Bytes::from);

        let (raw_body, meta) = self
            .dispatch(method, url, &options, Payload::Json(body))
            .await?;

        if let Some(destination) = response {
            if !raw_body.is_empty() {
                *destination = serde_json::from_slice(&raw_body).map_err(|e| {
                    let raw_response = String::from_utf8_lossy(&raw_body).into_owned();
                    tracing::error!(
                        error = %e,
                        raw_response = %raw_response,
                        "Failed to deserialize response"
                    );
                    Error::DeserializationFailed {
                        raw_response,
                        status: meta.status,
                        source: e,
                    }
                })?;
            }
        }

        Ok(meta)
    }

    /// Sends raw bytes and collects the raw response bytes.
    ///
    /// Nothing is interpreted: the body goes out as given and a non-empty
    /// success body replaces the destination's contents byte for byte.
    ///
    /// # Errors
    ///
    /// As [`Client::json_request`], minus the encoding and decoding errors.
    pub async fn binary_request(
        &self,
        method: Method,
        url: &str,
        request: BinaryRequest<'_>,
    ) -> Result<ResponseMeta> {
        let BinaryRequest {
            options,
            body,
            response,
        } = request;

        let (raw_body, meta) = self
            .dispatch(method, url, &options, Payload::Binary(body))
            .await?;

        if let Some(destination) = response {
            if !raw_body.is_empty() {
                destination.clear();
                destination.extend_from_slice(&raw_body);
            }
        }

        Ok(meta)
    }

    /// Sends an optionally streamed body and hands back the response body as a stream.
    ///
    /// The status check, token and error extraction are the same as for
    /// [`Client::binary_request`], but nothing is buffered. A streamed body
    /// can only be sent once, so a throttled streamed upload is not retried.
    ///
    /// # Errors
    ///
    /// As [`Client::binary_request`]. Failures while reading chunks come out
    /// of the stream as [`Error::BodyRead`].
    pub async fn stream_request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        body: Option<reqwest::Body>,
    ) -> Result<(ByteStream, ResponseMeta)> {
        let (response, meta) = self
            .send(method, url, &options, Payload::Stream(body))
            .await?;
        let chunks = response.bytes_stream().map_err(Error::BodyRead).boxed();
        Ok((chunks, meta))
    }

    /// GETs `url` and decodes the JSON response.
    pub async fn get_json<Res>(&self, url: &str) -> Result<Res>
    where
        Res: DeserializeOwned + Default,
    {
        let mut data = Res::default();
        self.json_request(Method::GET, url, JsonRequest::new().response(&mut data))
            .await?;
        Ok(data)
    }

    /// POSTs `body` as JSON to `url` and decodes the JSON response.
    pub async fn post_json<Req, Res>(
        &self,
        url: &str,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let mut data = Res::default();
        let request = JsonRequest::with_options(options)
            .body(body)
            .response(&mut data);
        self.json_request(Method::POST, url, request).await?;
        Ok(data)
    }

    /// PUTs `body` as JSON to `url` and decodes the JSON response.
    pub async fn put_json<Req, Res>(
        &self,
        url: &str,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let mut data = Res::default();
        let request = JsonRequest::with_options(options)
            .body(body)
            .response(&mut data);
        self.json_request(Method::PUT, url, request).await?;
        Ok(data)
    }

    /// DELETEs `url`, ignoring any response body.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ResponseMeta> {
        self.json_request(Method::DELETE, url, JsonRequest::with_options(options))
            .await
    }

    /// Sends one logical request and buffers the accepted response body.
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
        payload: Payload,
    ) -> Result<(Bytes, ResponseMeta)> {
        let (response, mut meta) = self.send(method, url, options, payload).await?;
        let read_started = Instant::now();
        let body = response.bytes().await.map_err(Error::BodyRead)?;
        meta.latency += read_started.elapsed();
        Ok((body, meta))
    }

    /// Sends one logical request, retrying while the server throttles.
    ///
    /// Returns the accepted response with its body still unread.
    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
        mut payload: Payload,
    ) -> Result<(reqwest::Response, ResponseMeta)> {
        let mut url = Url::parse(url)?;
        if !options.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&options.params);
        }

        let headers = self.request_headers(options, &payload)?;
        let policy = &self.inner.retry_policy;
        let start_time = Instant::now();
        let mut attempt = 1;

        loop {
            tracing::debug!(
                method = %method,
                url = %url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let mut request = self
                .inner
                .http_client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(timeout) = self.inner.timeout {
                request = request.timeout(timeout);
            }
            if let Some(body) = payload.next_body() {
                request = request.body(body);
            }

            let response = request.send().await.map_err(|e| {
                tracing::warn!(error = %e, method = %method, url = %url, "Request failed");
                let url = url.to_string();
                if e.is_timeout() {
                    Error::Timeout { url, source: e }
                } else {
                    Error::Transport { url, source: e }
                }
            })?;

            let status = response.status();
            tracing::info!(
                status = status.as_u16(),
                latency_ms = start_time.elapsed().as_millis() as u64,
                attempt = attempt,
                "Received HTTP response"
            );

            if status::accepts(status, &options.expected_status) {
                let meta = ResponseMeta {
                    status,
                    headers: response.headers().clone(),
                    latency: start_time.elapsed(),
                    attempts: attempt,
                };
                return Ok((response, meta));
            }

            let throttled = is_throttle_signal(status, response.headers());
            if throttled && payload.is_replayable() && policy.should_retry(attempt) {
                let hint = self.inner.rate_limit_config.hinted_delay(response.headers());
                let delay = hint.unwrap_or_else(|| policy.backoff.delay_for_retry(attempt));
                drop(response);

                self.inner.diagnostics.retrying(&RetryEvent {
                    method: method.clone(),
                    url: url.to_string(),
                    status,
                    attempt,
                    delay,
                    hinted: hint.is_some(),
                });

                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let error = unexpected_status(&url, response, &payload).await;
            if throttled && attempt > 1 {
                return Err(Error::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }
            return Err(error);
        }
    }

    /// Assembles the headers sent with every attempt of a request.
    fn request_headers(&self, options: &RequestOptions, payload: &Payload) -> Result<HeaderMap> {
        let mut headers = self.inner.default_headers.clone();

        let content_type = HeaderValue::from_static(payload.content_type());
        headers.insert(CONTENT_TYPE, content_type.clone());
        headers.insert(ACCEPT, content_type);

        for (name, value) in &options.headers {
            headers.append(name, value.clone());
        }

        // Last, so caller headers cannot replace it.
        if let Some(token) = self.inner.auth_token.read().as_deref() {
            let value = HeaderValue::from_str(token).map_err(|e| {
                Error::ConfigurationError(format!("auth token is not a valid header value: {e}"))
            })?;
            headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), value);
        }

        Ok(headers)
    }
}

/// Turns a rejected response into [`Error::UnexpectedStatus`].
async fn unexpected_status(
    url: &Url,
    response: reqwest::Response,
    payload: &Payload,
) -> Error {
    let status = response.status();
    let headers = response.headers().clone();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    // The status is what matters here; an unreadable body just leaves the detail empty.
    let body = response.bytes().await.unwrap_or_default();
    let detail = ErrorDetail::extract(&body, content_type);

    if status.is_client_error() {
        tracing::error!(status = status.as_u16(), detail = %detail, "Client error (4xx)");
    } else if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), detail = %detail, "Server error (5xx)");
    } else {
        tracing::warn!(status = status.as_u16(), detail = %detail, "Unexpected status");
    }

    Error::UnexpectedStatus {
        url: url.to_string(),
        status,
        detail,
        headers: Box::new(headers),
        request_body: payload.describe(),
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use stratus::{rate_limit::RateLimitConfig, Backoff, ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), stratus::Error> {
/// let client = ClientBuilder::new()
///     .auth_token("gAAAAABk...")
///     .endpoint("compute", "https://compute.example.com/v2/tenant")?
///     .endpoint("object-store", "https://swift.example.com/v1/AUTH_tenant")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::new(
///         5,
///         Backoff::Exponential {
///             initial_delay: Duration::from_millis(500),
///             max_delay: Duration::from_secs(20),
///             jitter: true,
///         },
///     ))
///     .rate_limit_config(RateLimitConfig::builder().max_wait(Duration::from_secs(60)).build())
///     .default_header("User-Agent", "backup-agent/2.1")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    http_client: Option<reqwest::Client>,
    auth_token: Option<String>,
    endpoints: HashMap<String, Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    rate_limit_config: RateLimitConfig,
    diagnostics: Arc<dyn Diagnostics>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            http_client: None,
            auth_token: None,
            endpoints: HashMap::new(),
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            rate_limit_config: RateLimitConfig::default(),
            diagnostics: Arc::new(TracingDiagnostics),
            timeout: None,
        }
    }

    /// Sets the auth token sent with every request. An empty token is ignored.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.auth_token = Some(token).filter(|t| !t.is_empty());
        self
    }

    /// Registers the base URL of a named service, e.g. `"compute"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn endpoint(mut self, service: impl Into<String>, url: impl AsRef<str>) -> Result<Self> {
        self.endpoints
            .insert(service.into(), Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry ceiling and backoff for throttled requests.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets how server delay hints are treated.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Sets the sink that receives retry notices. Defaults to [`TracingDiagnostics`].
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Sets a per-attempt timeout. Without one, a call can wait indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a preconfigured `reqwest` client as the transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::ConfigurationError(format!("failed to build HTTP transport: {e}"))
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                auth_token: RwLock::new(self.auth_token),
                endpoints: self.endpoints,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                rate_limit_config: self.rate_limit_config,
                diagnostics: self.diagnostics,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
