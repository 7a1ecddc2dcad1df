//! Small HTTP client shared by the page fetcher and the notification backends.
//!
//! - Bodies of scraped pages are force-decoded as UTF-8, whatever the charset
//! - JSON POSTs for provider APIs, including endpoints that answer `202` with no body
//! - Bearer tokens, secret headers and `/bot<token>/` path segments never reach the logs
//! - 429/5xx and network errors are retried with exponential backoff and
//!   `Retry-After` support, but only when a retry budget is set (default zero)
//! - `PAGEWATCH_HTTP_RAW=1` adds a curl line and the raw reply under target `http.raw`
//!
//! ```no_run
//! # async fn demo() -> Result<(), pagewatch_http::HttpError> {
//! let client = pagewatch_http::HttpClient::new("https://example.org/listings")?
//!     .with_user_agent("Mozilla/5.0")?;
//! let html = client.get_text("").await?;
//! # let _ = html;
//! # Ok(()) }
//! ```
mod error;
mod redact;
mod retry;

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use uuid::Uuid;

pub use error::HttpError;
pub use redact::redact_path;
pub use reqwest::StatusCode;

use redact::{RAW_MAX_BODY, curl_line, header_pairs, log_target, raw_enabled, snip_body};
use retry::RetryPolicy;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Credential attached to a request.
#[derive(Clone, Copy, Debug, Default)]
pub enum Auth<'a> {
    #[default]
    None,
    /// `Authorization: Bearer <token>`; surrounding quotes and whitespace are dropped.
    Bearer(&'a str),
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    timeout: Duration,
    max_retries: usize,
}

/// A completed exchange, before status interpretation.
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn request_id(&self) -> String {
        ["x-request-id", "x-message-id"]
            .iter()
            .find_map(|h| self.headers.get(*h)?.to_str().ok())
            .unwrap_or("-")
            .to_string()
    }
}

impl HttpClient {
    /// Client anchored to `base`; paths passed to the request methods are joined onto it.
    ///
    /// ```
    /// let client = pagewatch_http::HttpClient::new("https://api.telegram.org")?;
    /// assert_eq!(client.timeout().as_secs(), 30);
    /// assert_eq!(client.max_retries(), 0);
    /// # Ok::<(), pagewatch_http::HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        Ok(Self {
            base,
            inner: build_inner(None)?,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        })
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, HttpError> {
        self.inner = build_inner(Some(user_agent))?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// GET a document and decode it as UTF-8, replacing invalid sequences.
    pub async fn get_text(&self, path: &str) -> Result<String, HttpError> {
        let body = self.execute(Method::GET, path, Auth::None, None).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, auth: Auth<'_>, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self
            .execute(Method::POST, path, auth, Some(encode_json(body)?))
            .await?;
        decode_json(&bytes)
    }

    /// POST a JSON body to an endpoint whose success reply carries nothing of use.
    pub async fn post_json_no_content<B>(
        &self,
        path: &str,
        auth: Auth<'_>,
        body: &B,
    ) -> Result<(), HttpError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, auth, Some(encode_json(body)?))
            .await
            .map(drop)
    }

    /// Send, retrying within budget; returns the body of a 2xx reply.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        auth: Auth<'_>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, HttpError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let target = log_target(&url);
        let bearer = match auth {
            Auth::Bearer(raw) => Some(clean_bearer(raw)?),
            Auth::None => None,
        };
        let policy = RetryPolicy::new(self.max_retries);
        let req_id = Uuid::new_v4().simple().to_string();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            tracing::debug!(
                req_id = %req_id,
                attempt,
                max_retries = self.max_retries,
                method = %method,
                target = %target,
                timeout_ms = self.timeout.as_millis() as u64,
                has_auth = bearer.is_some(),
                body_len = body.as_ref().map_or(0, Vec::len),
                "http.request.start"
            );
            if raw_enabled() {
                let curl = curl_line(&method, &url, bearer.is_some(), body.as_deref());
                tracing::debug!(target: "http.raw", req_id = %req_id, curl = %curl, "request");
            }

            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(self.timeout);
            if let Some(token) = &bearer {
                rb = rb.bearer_auth(token);
            }
            if let Some(bytes) = &body {
                rb = rb
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(bytes.clone());
            }

            let started = Instant::now();
            let reply = match send(rb).await {
                Ok(reply) => reply,
                Err(err) => {
                    // reqwest messages may echo the URL, token included.
                    let message = err.without_url().to_string();
                    if let Some(delay) = policy.after_network_error(attempt) {
                        tracing::warn!(
                            req_id = %req_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            message = %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id = %req_id, target = %target, message = %message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let request_id = reply.request_id();

            tracing::debug!(
                req_id = %req_id,
                status = %reply.status,
                duration_ms = elapsed_ms,
                body_len = reply.body.len(),
                x_request_id = %request_id,
                "http.response"
            );
            if raw_enabled() {
                let shown = &reply.body[..reply.body.len().min(RAW_MAX_BODY)];
                tracing::debug!(
                    target: "http.raw",
                    req_id = %req_id,
                    status = %reply.status,
                    headers = ?header_pairs(&reply.headers),
                    body = %String::from_utf8_lossy(shown),
                    truncated = reply.body.len() > RAW_MAX_BODY,
                    "response"
                );
            }

            if reply.status.is_success() {
                return Ok(reply.body);
            }

            let message = error::provider_message(&reply.body);
            if let Some(delay) = policy.after_status(attempt, reply.status, &reply.headers) {
                tracing::warn!(
                    req_id = %req_id,
                    status = %reply.status,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id = %req_id,
                status = %reply.status,
                target = %target,
                message = %message,
                x_request_id = %request_id,
                "http.error"
            );
            return Err(HttpError::Api {
                status: reply.status,
                message,
                request_id,
            });
        }
    }
}

async fn send(rb: reqwest::RequestBuilder) -> Result<Reply, reqwest::Error> {
    let resp = rb.send().await?;
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.bytes().await?.to_vec();
    Ok(Reply {
        status,
        headers,
        body,
    })
}

fn build_inner(user_agent: Option<&str>) -> Result<Client, HttpError> {
    let builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    let builder = match user_agent {
        Some(ua) => builder.user_agent(ua.to_string()),
        None => builder,
    };
    builder.build().map_err(|e| HttpError::Build(e.to_string()))
}

fn encode_json<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, HttpError> {
    serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(error = %e, body_snippet = %snippet, "http.response.decode_error");
        HttpError::Decode(e.to_string(), snippet)
    })
}

/// Tokens pasted into env files often carry quotes, spaces or a trailing newline.
fn clean_bearer(raw: &str) -> Result<String, HttpError> {
    let token: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if token.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(HttpError::Build(
            "bearer token contains non-ASCII or control characters".into(),
        ));
    }
    Ok(token)
}
