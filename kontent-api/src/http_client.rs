//! HttpClient middleware used by KontentClient
//!
//! Responsible for
//!  - handing all HTTP api requests
//!  - logging/tracing
//!  - retries and backoff (for timeouts and connection errors)
//!  - rate limiting
//!  - mapping error responses into `KontentError`

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::{
    ClientBuilder, Method, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Result,
    client::SecretApiKey,
    config::{
        CONTINUATION_HEADER, MAX_RETRIES, RATE_LIMIT_WAIT_MAX_SECS, RATE_LIMIT_WAIT_WARN_SECS,
    },
    error::{ApiErrorBody, HttpSnafu, KontentError, SerializationSnafu},
    paged::PagedResult,
};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    total_requests: AtomicU64,
    successful_responses: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    rate_limit_errors: AtomicU64,
    rate_limit_delay_secs: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            rate_limit_errors: self.rate_limit_errors.load(Ordering::Relaxed),
            rate_limit_delay_secs: self.rate_limit_delay_secs.load(Ordering::Relaxed),
        }
    }

    fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of error responses (non-2xx status codes, excluding rate limit errors)
    pub errors: u64,
    /// Total number of retry attempts
    pub retries: u64,
    /// Total bytes sent in request bodies
    pub bytes_sent: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
    /// Total number of rate limit errors (429 responses)
    pub rate_limit_errors: u64,
    /// Total seconds spent waiting for rate limit backoff
    pub rate_limit_delay_secs: u64,
}

impl fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} retries={} rate_limit={}/{}s sent={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            self.retries,
            self.rate_limit_errors,
            self.rate_limit_delay_secs,
            format_bytes(self.bytes_sent),
            format_bytes(self.bytes_received),
        )
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// status codes where it's ok to retry and backoff
fn retry_for_status(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::REQUEST_TIMEOUT /* 408 */
            | StatusCode::BAD_GATEWAY /* 502 */
            | StatusCode::SERVICE_UNAVAILABLE /* 503 */
            | StatusCode::GATEWAY_TIMEOUT /* 504 */
    )
}

/// status codes whose body is the structured management api error
fn has_structured_body(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

#[derive(Clone, Default)]
pub(crate) struct HttpRequest {
    pub method: Method,
    /// Path under the environment root, or a complete url when `absolute` is set.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Content type of `body`; json when unset.
    pub content_type: Option<String>,
    /// Absolute url, sent without credentials (asset downloads).
    pub absolute: bool,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body.as_ref().map_or(0, Bytes::len))
            .finish_non_exhaustive()
    }
}

impl HttpRequest {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub(crate) fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(Bytes::from(
            serde_json::to_vec(body).context(SerializationSnafu)?,
        ));
        Ok(self)
    }

    /// Create a new request for the page following `token`.
    /// This replaces any existing continuation header.
    pub(crate) fn with_continuation(&self, token: &str) -> Self {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(key, _)| key != CONTINUATION_HEADER)
            .cloned()
            .collect();
        headers.push((CONTINUATION_HEADER.to_string(), token.to_string()));
        Self {
            headers,
            ..self.clone()
        }
    }
}

pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., `https://manage.kontent.ai/v2`)
    pub base_url: String,

    pub environment_id: String,

    pub api_key: Arc<Mutex<Option<SecretApiKey>>>,

    // Max consecutive 429 retries before failing; 0 disables cap.
    rate_limit_max_retries: u32,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("environment_id", &self.environment_id)
            .field("has_key", &self.has_key())
            .finish_non_exhaustive()
    }
}

struct ParsedRetry {
    header: String,
    duration: Duration,
}

/// Parse the `Retry-After` header of a 429 response. The management api sends
/// the number of seconds to wait.
fn parse_retry_after(headers: &HeaderMap) -> Result<ParsedRetry> {
    if let Some(header_value) = headers.get(RETRY_AFTER)
        && let Ok(header) = header_value.to_str()
    {
        if let Ok(secs) = header.trim().parse::<u64>() {
            return Ok(ParsedRetry {
                duration: Duration::from_secs(secs),
                header: header.to_string(),
            });
        }
        error!("Could not parse 429 response header 'retry-after: {header}'");
    }

    Err(KontentError::RateLimitExceeded {
        header: "Received 429 response but couldn't parse Retry-After header. See logs"
            .to_string(),
        duration: Duration::from_secs(0),
    })
}

impl HttpClient {
    pub fn new(
        builder: ClientBuilder,
        base_url: String,
        environment_id: String,
        rate_limit_max_retries: u32,
    ) -> Result<Self> {
        let client = builder.build().context(HttpSnafu {
            method: "client-init",
            url: "",
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            environment_id,
            api_key: Arc::new(Mutex::new(None)),
            rate_limit_max_retries,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns true if api_key has been initialized.
    pub fn has_key(&self) -> bool {
        self.api_key.lock().is_some()
    }

    /// Sets the API key for authenticated requests.
    pub fn set_api_key(&self, api_key: &SecretApiKey) {
        *self.api_key.lock() = Some(api_key.clone());
    }

    /// Full url for a path under the environment root.
    pub(crate) fn url_for(&self, path: &str) -> String {
        format!(
            "{}/projects/{}{}",
            self.base_url, self.environment_id, path
        )
    }

    pub(crate) async fn get_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(HttpRequest::new(Method::GET, path)).await
    }

    pub(crate) async fn post_request<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(HttpRequest::new(Method::POST, path).json(body)?)
            .await
    }

    pub(crate) async fn put_request<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(HttpRequest::new(Method::PUT, path).json(body)?)
            .await
    }

    /// PUT without a body (publish and similar state transitions).
    pub(crate) async fn put_empty(&self, path: &str) -> Result<()> {
        self.send(HttpRequest::new(Method::PUT, path)).await
    }

    pub(crate) async fn patch_request<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(HttpRequest::new(Method::PATCH, path).json(body)?)
            .await
    }

    pub(crate) async fn delete_request(&self, path: &str) -> Result<()> {
        self.send(HttpRequest::new(Method::DELETE, path)).await
    }

    /// POST raw bytes with an explicit content type (binary file upload).
    pub(crate) async fn post_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<T> {
        let req = HttpRequest {
            body: Some(data),
            content_type: Some(content_type.to_string()),
            ..HttpRequest::new(Method::POST, path)
        };
        self.send(req).await
    }

    /// GET an absolute url without credentials and return the raw body.
    pub(crate) async fn download(&self, url: &str) -> Result<Bytes> {
        let req = HttpRequest {
            absolute: true,
            ..HttpRequest::new(Method::GET, url)
        };
        self.send_raw(req).await
    }

    /// Sends the request and deserializes the json response body into T.
    /// An empty body (204 No Content) deserializes as json `null`.
    pub(crate) async fn send<T: DeserializeOwned>(&self, req: HttpRequest) -> Result<T> {
        let body = self.send_raw(req).await?;
        if body.is_empty() {
            return deserialize_json(b"null");
        }
        deserialize_json(&body)
    }

    /// This function handles all management api requests (http: get,post,put,patch,delete)
    /// - handles 429 rate limit feedback
    /// - retries up to N(=3) times for connection failures or server timeout
    /// - maps http error codes into KontentErrors
    /// - returns the raw response body
    pub(crate) async fn send_raw(&self, req: HttpRequest) -> Result<Bytes> {
        // attempt counter is for server busy and connection drop errors
        // counter is reset to 0 whenever we wait based on 429 rate limit response
        let mut attempt = 0u32;
        let mut rate_limit_retries = 0u32;

        // time to wait on next iteration
        let mut retry_wait: Option<Duration> = None;

        let full_url = if req.absolute {
            req.path.clone()
        } else {
            self.url_for(&req.path)
        };
        let mut req_builder = self.client.request(req.method.clone(), &full_url);
        for (name, value) in &req.headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }
        if req.body.is_some() {
            let content_type = req.content_type.as_deref().unwrap_or("application/json");
            req_builder = req_builder.header(CONTENT_TYPE, content_type);
        }
        if !req.absolute {
            let api_key = self.api_key.lock().clone().ok_or(KontentError::Unauthorized)?;
            req_builder = api_key.set_auth_header(req_builder);
        }

        // debug log (if tracing enabled)
        log_request(&req_builder, req.body.as_ref(), req.content_type.as_deref());
        debug!(method = %req.method, url = %full_url, "http request");

        // Track bytes to be sent (body size)
        let body_size = req.body.as_ref().map_or(0, |b| b.len() as u64);

        loop {
            if let Some(wait_time) = retry_wait {
                info!("RateLimit: pausing for {} sec", wait_time.as_secs());
                tokio::time::sleep(wait_time).await;
                retry_wait = None;
                attempt = 0;
            }
            let request = req_builder
                .try_clone()
                .ok_or_else(|| KontentError::Other {
                    message: "reqwest::RequestBuilder internal error".into(),
                })?
                .body(req.body.clone().unwrap_or_default());

            HttpMetrics::increment(&self.metrics.total_requests);
            HttpMetrics::add(&self.metrics.bytes_sent, body_size);

            match request.send().await {
                Ok(response) => {
                    let code = response.status();
                    if code != StatusCode::TOO_MANY_REQUESTS {
                        rate_limit_retries = 0;
                    }
                    match code {
                        // 2xx
                        ok if ok.is_success() => {
                            // If we fail to fully read the response, don't retry. The server might
                            // believe the request succeeded, and the request may not be idempotent.
                            let body = response.bytes().await.context(HttpSnafu {
                                method: req.method.to_string(),
                                url: full_url.clone(),
                            })?;
                            HttpMetrics::increment(&self.metrics.successful_responses);
                            HttpMetrics::add(&self.metrics.bytes_received, body.len() as u64);

                            if !req.absolute {
                                log_response(&req.path, &body);
                            }
                            return Ok(body);
                        }
                        StatusCode::TOO_MANY_REQUESTS /* 429 */ => {
                            HttpMetrics::increment(&self.metrics.rate_limit_errors);
                            rate_limit_retries = rate_limit_retries.saturating_add(1);
                            let ParsedRetry { header, duration } =
                                parse_retry_after(response.headers()).inspect_err(|e| {
                                    error!("{e:?}");
                                })?;
                            if self.rate_limit_max_retries > 0
                                && rate_limit_retries > self.rate_limit_max_retries
                            {
                                error!(
                                    attempt,
                                    ?req,
                                    "http 429 Rate-limit retries exceeded max={}",
                                    self.rate_limit_max_retries
                                );
                                return Err(KontentError::RateLimitExceeded { header, duration });
                            }
                            if duration > Duration::from_secs(RATE_LIMIT_WAIT_MAX_SECS) {
                                error!(
                                    attempt,
                                    ?req,
                                    "http 429 Rate-limit backoff={}s exceeds max",
                                    duration.as_secs()
                                );
                                return Err(KontentError::RateLimitExceeded { header, duration });
                            }
                            if duration > Duration::from_secs(RATE_LIMIT_WAIT_WARN_SECS) {
                                warn!(attempt, "http 429 Rate-limit backoff={}s", duration.as_secs());
                            }
                            HttpMetrics::increment(&self.metrics.retries);
                            HttpMetrics::add(&self.metrics.rate_limit_delay_secs, duration.as_secs());
                            retry_wait = Some(duration.max(Duration::from_secs(1)));
                        }
                        structured if has_structured_body(structured) => {
                            HttpMetrics::increment(&self.metrics.errors);
                            let text = response.text().await.unwrap_or_default();
                            debug!(?code, body = %text, ?req, "http");
                            return Err(api_error(code, &req.method, &full_url, &text));
                        }
                        StatusCode::NOT_FOUND /* 404 */ => {
                            HttpMetrics::increment(&self.metrics.errors);
                            let message = response.text().await.unwrap_or_default();
                            debug!(?code, ?message, ?req, "http");
                            return Err(KontentError::NotFound {
                                obj_type: "resource".into(),
                                key: req.path,
                            });
                        }
                        StatusCode::UNAUTHORIZED /* 401 */ => {
                            HttpMetrics::increment(&self.metrics.errors);
                            let message = response.text().await.unwrap_or_default();
                            error!(?code, ?message, ?req, "http");
                            return Err(KontentError::Unauthorized);
                        }
                        StatusCode::FORBIDDEN /* 403 */ => {
                            HttpMetrics::increment(&self.metrics.errors);
                            let message = response.text().await.unwrap_or_default();
                            error!(?code, ?message, ?req, "http");
                            return Err(KontentError::Forbidden);
                        }
                        _ => {
                            let message = response.text().await.unwrap_or_default();
                            error!(?code, ?req, message, attempt, "http");
                            HttpMetrics::increment(&self.metrics.errors);
                            if retry_for_status(code) && is_idempotent_method(&req.method) {
                                if attempt < MAX_RETRIES {
                                    log_and_backoff(attempt, code.to_string()).await;
                                    HttpMetrics::increment(&self.metrics.retries);
                                    attempt += 1;
                                    continue;
                                }
                                return Err(KontentError::TooManyRetries { n: attempt + 1 });
                            }
                            return Err(api_error(code, &req.method, &full_url, &message));
                        }
                    }
                }
                Err(e) => {
                    error!(source=?e, ?req, "http");
                    // Check for connection or timeout errors
                    if (e.is_connect() || e.is_timeout())
                        && is_idempotent_method(&req.method)
                        && attempt < MAX_RETRIES
                    {
                        rate_limit_retries = 0;
                        log_and_backoff(attempt, e.to_string()).await;
                        HttpMetrics::increment(&self.metrics.retries);
                        attempt += 1;
                        continue;
                    }
                    HttpMetrics::increment(&self.metrics.errors);
                    return Err(KontentError::Http {
                        method: req.method.to_string(),
                        url: full_url,
                        source: e,
                    });
                }
            }
        }
    }
}

/// Build an `Api` error, using the structured body when the server sent one.
fn api_error(code: StatusCode, method: &Method, url: &str, text: &str) -> KontentError {
    let body = serde_json::from_str::<ApiErrorBody>(text).unwrap_or_else(|_| ApiErrorBody {
        message: text.to_string(),
        ..Default::default()
    });
    KontentError::Api {
        status: code.as_u16(),
        method: method.to_string(),
        url: url.to_string(),
        message: body.message,
        error_code: body.error_code,
        request_id: body.request_id,
        validation_errors: body.validation_errors,
    }
}

// The purpose of this trait is to define methods for Arc<HttpClient>
pub(crate) trait GetPaged {
    async fn get_request_paged<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &str,
        items_key: &'static str,
    ) -> Result<PagedResult<T>>;
}

impl GetPaged for Arc<HttpClient> {
    /// Makes an authenticated GET request that returns a `PagedResult` for pagination support.
    async fn get_request_paged<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &str,
        items_key: &'static str,
    ) -> Result<PagedResult<T>> {
        let req = HttpRequest::new(Method::GET, path);
        let page = self.send(req.clone()).await?;
        PagedResult::from_first_page(page, items_key, self.clone(), req)
    }
}

// dump request
// requires RUST_LOG=kontent::http_json=trace
fn log_request(
    builder: &reqwest::RequestBuilder,
    body: Option<&Bytes>,
    content_type: Option<&str>,
) {
    if tracing::enabled!(target: "kontent::http_json", tracing::Level::TRACE)
        && let Some(req) = builder.try_clone().and_then(|b| b.build().ok())
    {
        let method = req.method().as_str();
        let url = req.url();
        // binary uploads are logged by size only
        let body = match (body, content_type) {
            (Some(b), Some(_)) => format!("<{} bytes>", b.len()),
            (Some(b), None) => String::from_utf8_lossy(b).to_string(),
            (None, _) => String::new(),
        };
        // don't log headers so we don't leak api key
        trace!(target: "kontent::http_json", "{method} url={url} body={body}");
    }
}

// dump json response, for debugging
fn log_response(path: &str, body: &Bytes) {
    if tracing::enabled!(target: "kontent::http_json", tracing::Level::TRACE) {
        trace!(target: "kontent::http_json", "Response path={path} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
pub(crate) fn deserialize_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Deserialization failed at {}: {}", err.path(), err);
            Err(KontentError::Deserialization {
                source: err.into_inner(),
            })
        }
    }
}

// log attempt and sleep for exponential backoff
async fn log_and_backoff(attempt: u32, err: String) {
    // exponential backoff: 1s, 2s, 4s, with jitter
    let base_delay = 2u64.pow(attempt);
    let jitter = f64::from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    ) / 1_000_000_000.0;
    let jittered_delay = ((base_delay as f64) * (0.5 + jitter)).round() as u64;
    let delay = jittered_delay.max(1);
    warn!("Recoverable error {err}. Attempt {attempt}. Waiting {delay}s before retry");
    tokio::time::sleep(Duration::from_secs(delay)).await;
}

fn is_idempotent_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_for_status() {
        assert!(retry_for_status(StatusCode::REQUEST_TIMEOUT));
        assert!(retry_for_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(retry_for_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!retry_for_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!retry_for_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        let parsed = parse_retry_after(&headers).expect("parse retry header");
        assert_eq!(parsed.duration.as_secs(), 3);
        assert_eq!(parsed.header, "3");
    }

    #[test]
    fn test_parse_retry_after_missing() {
        let err = parse_retry_after(&HeaderMap::new()).err();
        assert!(matches!(
            err,
            Some(KontentError::RateLimitExceeded { .. })
        ));
    }

    #[test]
    fn continuation_header_is_replaced() {
        let req = HttpRequest::new(Method::GET, "/types").with_continuation("first");
        let next = req.with_continuation("second");
        assert_eq!(
            next.headers,
            vec![(CONTINUATION_HEADER.to_string(), "second".to_string())]
        );
        assert_eq!(next.path, "/types");
    }

    #[test]
    fn api_error_uses_structured_body() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            &Method::POST,
            "https://example/types",
            r#"{"request_id":"r1","error_code":5,"message":"invalid","validation_errors":[{"message":"bad codename"}]}"#,
        );
        assert_eq!(err.error_code(), Some(5));
        assert_eq!(err.request_id(), Some("r1"));
        assert_eq!(err.validation_errors()[0].message, "bad codename");
    }

    #[test]
    fn api_error_keeps_plain_text_body() {
        let err = api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &Method::GET,
            "https://example/types",
            "upstream exploded",
        );
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn empty_body_deserializes_as_unit() {
        deserialize_json::<()>(b"null").unwrap();
        assert!(deserialize_json::<()>(b"{}").is_err());
    }
}
