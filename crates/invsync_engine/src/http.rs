//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different
//! libraries (reqwest, ureq, platform stacks) can be plugged in. The
//! transport owns the bearer-token cache: token refresh is guarded by one
//! mutex so a stampede of requests discovering an expired token triggers
//! a single refresh, and a refresh less than a few seconds old is reused
//! rather than re-triggered.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use invsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a 200 response with the given body.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Creates a bodyless response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implementations must enforce the configured request timeout themselves;
/// a returned `Err` means the request never produced an HTTP status
/// (connection failure, timeout) and is treated as retryable.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a bearer token and a JSON body.
    fn post(&self, url: &str, bearer: &str, body: &[u8]) -> Result<HttpResponse, String>;
}

/// Issues bearer tokens. The real implementation talks to the auth
/// service; out of scope here.
pub trait TokenSource: Send + Sync {
    /// Fetches a fresh token.
    fn fetch(&self) -> Result<String, String>;
}

/// A counting token source for tests: yields `token-1`, `token-2`, ...
#[derive(Debug, Default)]
pub struct StaticTokenSource {
    issued: AtomicU64,
}

impl StaticTokenSource {
    /// Creates the source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens issued so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl TokenSource for StaticTokenSource {
    fn fetch(&self) -> Result<String, String> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{n}"))
    }
}

struct CachedToken {
    token: String,
    refreshed_at: Instant,
}

/// Mutex-guarded bearer-token cache.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<CachedToken>>,
    reuse_window: Duration,
}

impl TokenCache {
    /// Creates a cache over the given source with a 5 second reuse window.
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_reuse_window(source, Duration::from_secs(5))
    }

    /// Creates a cache with an explicit reuse window.
    pub fn with_reuse_window(source: Arc<dyn TokenSource>, reuse_window: Duration) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            reuse_window,
        }
    }

    /// Returns the cached token, fetching one if none is held yet.
    pub fn token(&self) -> Result<String, String> {
        let mut guard = self.cached.lock();
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.token.clone());
        }
        let token = self.source.fetch()?;
        *guard = Some(CachedToken {
            token: token.clone(),
            refreshed_at: Instant::now(),
        });
        Ok(token)
    }

    /// Replaces the cached token, unless a concurrent caller refreshed
    /// within the reuse window — then that token is returned instead.
    pub fn refresh(&self) -> Result<String, String> {
        let mut guard = self.cached.lock();
        if let Some(cached) = guard.as_ref() {
            if cached.refreshed_at.elapsed() < self.reuse_window {
                return Ok(cached.token.clone());
            }
        }
        let token = self.source.fetch()?;
        *guard = Some(CachedToken {
            token: token.clone(),
            refreshed_at: Instant::now(),
        });
        Ok(token)
    }
}

/// HTTP-based sync transport with JSON bodies.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    tokens: TokenCache,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport against the given base URL.
    pub fn new(base_url: impl Into<String>, client: C, tokens: TokenCache) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            tokens,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;
        let url = format!("{}{}", self.base_url, endpoint);

        let token = self.tokens.token().map_err(SyncError::Auth)?;
        let mut response = self
            .client
            .post(&url, &token, &body)
            .map_err(SyncError::transport_retryable)?;

        if response.status == 401 {
            // Expired token: refresh once and retry the same request.
            let token = self.tokens.refresh().map_err(SyncError::Auth)?;
            response = self
                .client
                .post(&url, &token, &body)
                .map_err(SyncError::transport_retryable)?;
        }

        match response.status {
            200 => serde_json::from_slice(&response.body)
                .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}"))),
            401 => Err(SyncError::Auth("request rejected after token refresh".into())),
            status if (500..600).contains(&status) => Err(SyncError::transport_retryable(
                format!("server returned {status}"),
            )),
            status => Err(SyncError::transport_fatal(format!(
                "server returned {status}"
            ))),
        }
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_json("/sync/push", request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_json("/sync/pull", request)
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST and returns the response.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<HttpResponse, String>;
}

/// An HTTP client that routes requests directly to an in-process server.
///
/// Useful for end-to-end tests without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a loopback client over the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, _bearer: &str, body: &[u8]) -> Result<HttpResponse, String> {
        let path = url.find("/sync/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, body)
    }
}
