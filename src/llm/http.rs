//! HTTP model transport
//!
//! Posts chat payloads to an OpenAI- or Anthropic-style endpoint. Network
//! failures (connect errors, timeouts) are retried with a fixed delay; HTTP
//! error statuses are handed back to the caller untouched.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{ModelConfig, Result, RetryConfig, ScreenwrightError, WireStyle};
use crate::llm::traits::{ModelTransport, RawResponse};

/// Fixed-delay retry policy for network-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out. The last error is returned.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> std::result::Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.backoff_secs))
    }
}

/// Chat request body. Unset sampling parameters are omitted.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// HTTP transport for one model endpoint
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    model: ModelConfig,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport from model and retry configuration
    pub fn from_config(model: &ModelConfig, retry: &RetryConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(ref proxy) = model.proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|e| ScreenwrightError::config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScreenwrightError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: model.clone(),
            retry: RetryPolicy::from(retry),
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_payload<'a>(&'a self, messages: &'a [Value]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model.model_name,
            messages,
            max_tokens: self.model.max_tokens,
            top_p: self.model.top_p,
            temperature: self.model.temperature,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match self.model.style {
            WireStyle::OpenAi => Ok(match self.model.api_key {
                Some(ref key) => request.bearer_auth(key),
                None => request,
            }),
            WireStyle::Anthropic => {
                let key = self.model.api_key.as_deref().ok_or_else(|| {
                    ScreenwrightError::config("anthropic style requires an api_key")
                })?;
                let version = self.model.version.as_deref().ok_or_else(|| {
                    ScreenwrightError::config("anthropic style requires a version")
                })?;
                Ok(request
                    .header("x-api-key", key)
                    .header("anthropic-version", version))
            }
        }
    }
}

/// Network-level failures worth another attempt
fn is_network_failure(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

#[async_trait]
impl ModelTransport for HttpTransport {
    async fn send(&self, messages: &[Value], timeout: Duration) -> Result<RawResponse> {
        let payload = self.build_payload(messages);
        debug!(
            model = %self.model.model_name,
            messages = messages.len(),
            "Sending model request"
        );

        let this = self;
        let payload = &payload;
        let response = self
            .retry
            .run(
                move |_attempt| async move {
                    let request = this
                        .client
                        .post(&this.model.base_url)
                        .json(payload)
                        .timeout(timeout);
                    let request = this.authorize(request).map_err(SendError::Fatal)?;

                    let response = request.send().await.map_err(SendError::Network)?;
                    let status = response.status().as_u16();
                    let body = response.text().await.map_err(SendError::Network)?;
                    Ok(RawResponse::new(status, body))
                },
                |e: &SendError| matches!(e, SendError::Network(err) if is_network_failure(err)),
            )
            .await
            .map_err(|e| match e {
                SendError::Fatal(err) => err,
                SendError::Network(err) => ScreenwrightError::transport(format!(
                    "{} unreachable after {} attempts: {}",
                    self.model.base_url, self.retry.max_attempts, err
                )),
            })?;

        if !response.is_success() {
            warn!(status = response.status, model = %self.model.model_name, "Model endpoint returned an error status");
        }

        Ok(response)
    }

    fn style(&self) -> WireStyle {
        self.model.style
    }

    fn name(&self) -> &str {
        &self.model.model_name
    }
}

enum SendError {
    Network(reqwest::Error),
    Fatal(ScreenwrightError),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Network(e) => write!(f, "{}", e),
            SendError::Fatal(e) => write!(f, "{}", e),
        }
    }
}
