//! Configuration backends: where remote declarations are fetched from and pushed to.
//!
//! Responsibilities:
//! - Define the `ConfigBackend` collaborator used by `RemoteProvider` and `admin`.
//! - Implement it over HTTP with bearer auth and retry with exponential backoff.
//! - Adapt plain closures for embedding and tests.
//!
//! Does NOT handle:
//! - Scheduling (see `remote`) or diffing (see `admin`).
//!
//! Invariants:
//! - Only HTTP 429/502/503/504 and connect/timeout failures are retried.
//! - The API token is only exposed when building the Authorization header.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{self, BoxFuture};
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use url::Url;
use variables_config::constants::VARIABLES_ENDPOINT;
use variables_config::{Settings, VariablesConfig};

use crate::error::{Result, VariablesError};
use crate::metrics;

/// Initial delay between retries; doubled on every attempt.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Longest error body excerpt carried in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Source and sink of remote variable declarations.
pub trait ConfigBackend: Send + Sync {
    /// Fetch the full remote declaration.
    fn fetch(&self) -> BoxFuture<'_, Result<VariablesConfig>>;

    /// Replace the remote declaration.
    fn push<'a>(&'a self, config: &'a VariablesConfig) -> BoxFuture<'a, Result<()>>;
}

/// HTTP backend speaking the `/v1/variables` JSON document.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: Url,
    api_token: Option<SecretString>,
    max_retries: usize,
    retry_backoff: Duration,
}

impl HttpBackend {
    /// Create a backend for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFetch` if the HTTP client cannot be built or the
    /// endpoint URL cannot be formed.
    pub fn new(
        base_url: &Url,
        api_token: Option<SecretString>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VariablesError::from)?;
        let endpoint = Url::parse(&format!(
            "{}{}",
            base_url.as_str().trim_end_matches('/'),
            VARIABLES_ENDPOINT
        ))
        .map_err(|e| VariablesError::fetch(format!("invalid endpoint URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_token,
            max_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Create a backend from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFetch` when no base URL is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .base_url
            .as_ref()
            .ok_or_else(|| VariablesError::fetch("no base URL configured"))?;
        Self::new(
            base_url,
            settings.api_token.clone(),
            settings.http_timeout,
            settings.max_retries,
        )
    }

    /// Builder method to set the initial retry delay.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn fetch_document(&self) -> Result<VariablesConfig> {
        let started = Instant::now();
        let builder = self.authorized(self.client.get(self.endpoint.clone()));
        let result = self.send_with_retry(builder).await;
        metrics::record_fetch_duration(started.elapsed());

        let response = result?;
        let body = response.text().await.map_err(VariablesError::from)?;
        let config = VariablesConfig::from_json_str(&body)?;
        debug!(
            endpoint = %self.endpoint,
            variables = config.len(),
            "Fetched variables configuration"
        );
        Ok(config)
    }

    async fn push_document(&self, config: &VariablesConfig) -> Result<()> {
        let body = config.to_json_string()?;
        let builder = self
            .authorized(self.client.put(self.endpoint.clone()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send_with_retry(builder).await?;
        debug!(
            endpoint = %self.endpoint,
            variables = config.len(),
            "Pushed variables configuration"
        );
        Ok(())
    }

    /// Sends a request, retrying transient failures with exponential backoff.
    async fn send_with_retry(&self, builder: RequestBuilder) -> Result<Response> {
        let mut attempt = 0usize;
        loop {
            let Some(attempt_builder) = builder.try_clone() else {
                debug!("Request builder cannot be cloned, single attempt only");
                return check_status(builder.send().await?).await;
            };

            let retryable = match attempt_builder.send().await {
                Ok(response)
                    if VariablesError::is_retryable_status(response.status().as_u16()) =>
                {
                    format!("HTTP {}", response.status().as_u16())
                }
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Request succeeded after retry");
                    }
                    return check_status(response).await;
                }
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(VariablesError::from(e)),
            };

            if attempt >= self.max_retries {
                debug!(
                    attempts = attempt + 1,
                    reason = %retryable,
                    "Max retries exhausted"
                );
                return Err(VariablesError::fetch(format!(
                    "giving up after {} attempt(s): {retryable}",
                    attempt + 1
                )));
            }

            let backoff = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt as u32));
            warn!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                reason = %retryable,
                "Transient backend failure, retrying with exponential backoff"
            );
            metrics::record_fetch_retry();
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response body".to_string());
    let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    Err(VariablesError::ConfigFetch {
        message: format!("HTTP {} from {url}: {excerpt}", status.as_u16()),
        status: Some(status.as_u16()),
    })
}

impl ConfigBackend for HttpBackend {
    fn fetch(&self) -> BoxFuture<'_, Result<VariablesConfig>> {
        Box::pin(self.fetch_document())
    }

    fn push<'a>(&'a self, config: &'a VariablesConfig) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.push_document(config))
    }
}

type FetchFn = dyn Fn() -> Result<VariablesConfig> + Send + Sync;
type PushFn = dyn Fn(&VariablesConfig) -> Result<()> + Send + Sync;

/// Backend adapting synchronous closures.
#[derive(Clone)]
pub struct FnBackend {
    fetch: Arc<FetchFn>,
    push: Option<Arc<PushFn>>,
}

impl std::fmt::Debug for FnBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend")
            .field("push", &self.push.is_some())
            .finish()
    }
}

impl FnBackend {
    pub fn new(fetch: impl Fn() -> Result<VariablesConfig> + Send + Sync + 'static) -> Self {
        Self {
            fetch: Arc::new(fetch),
            push: None,
        }
    }

    /// Builder method to accept pushes. Without it, `push` fails.
    pub fn with_push(
        mut self,
        push: impl Fn(&VariablesConfig) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.push = Some(Arc::new(push));
        self
    }
}

impl ConfigBackend for FnBackend {
    fn fetch(&self) -> BoxFuture<'_, Result<VariablesConfig>> {
        Box::pin(future::ready((self.fetch)()))
    }

    fn push<'a>(&'a self, config: &'a VariablesConfig) -> BoxFuture<'a, Result<()>> {
        let result = match &self.push {
            Some(push) => push(config),
            None => Err(VariablesError::fetch("backend does not accept pushes")),
        };
        Box::pin(future::ready(result))
    }
}
