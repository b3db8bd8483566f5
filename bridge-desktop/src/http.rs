//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based HTTP client
///
/// Retries connection failures, `429` and `5xx` responses with exponential
/// backoff. Streamed downloads are not retried; a broken transfer surfaces as
/// an error from the chunk stream.
pub struct ReqwestHttpClient {
    client: Client,
    policy: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// The timeout applies to buffered requests. Downloads use
    /// `download_timeout` set by the caller around the whole transfer.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("mini-player-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            policy: RetryPolicy::default(),
            request_timeout: Some(timeout),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            request_timeout: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if let Some(timeout) = request.timeout.or(self.request_timeout) {
            req = req.timeout(timeout);
        }

        req
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self.policy.base_delay * 2u32.pow(attempt.saturating_sub(1));
        exponential.min(self.policy.max_delay)
    }

    fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }

    fn map_send_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(e.to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.policy.max_attempts,
                url = %request.url,
                "Executing HTTP request"
            );

            match self.build_request(&request).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if status >= 500 || status == 429 {
                        warn!(status, attempt = attempt + 1, "Retryable HTTP status");
                        last_error =
                            Some(BridgeError::OperationFailed(format!("HTTP {} error", status)));
                    } else {
                        let headers = Self::collect_headers(&response);
                        let body = response
                            .bytes()
                            .await
                            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

                        return Ok(HttpResponse {
                            status,
                            headers,
                            body,
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "HTTP request failed");
                    last_error = Some(Self::map_send_error(e));
                }
            }

            attempt += 1;

            if attempt < self.policy.max_attempts {
                let delay = self.backoff(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }

    async fn download_stream(&self, url: String) -> Result<DownloadStream> {
        debug!(url = %url, "Opening download stream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let chunks = response
            .bytes_stream()
            .map_err(|e| BridgeError::OperationFailed(format!("Download interrupted: {}", e)))
            .boxed();

        Ok(DownloadStream {
            status,
            content_length,
            chunks,
        })
    }
}
