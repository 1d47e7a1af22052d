mod builder;
mod retry;
mod stats;

use crate::error::{ClientError, Result};
pub use crate::{log_debug, log_error, log_info, log_warn};
pub use builder::ClientBuilder;
use http::Method;
pub use retry::RetryPolicy;
use rquest::Client as RquestClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
pub use stats::RequestStats;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug)]
pub struct ClientResponse {
    pub status: u16,
    pub content: String,
}

impl ClientResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// What a request carries besides its headers.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Query(&'a [(&'a str, String)]),
    Form(&'a [(&'a str, String)]),
    Json(&'a Value),
}

/// HTTP client shared by every worker of a run.
///
/// Every request is retried on transport failures (connection errors,
/// timeouts, non-2xx statuses) until it succeeds or the retry policy gives
/// up, in which case `ClientError::RetriesExhausted` is returned.
pub struct Client {
    inner: RquestClient,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
    stats: Mutex<RequestStats>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ClientResponse> {
        self.request(Method::GET, path, Payload::Query(query)).await
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<ClientResponse> {
        self.request(Method::POST, path, Payload::Form(form)).await
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Result<ClientResponse> {
        self.request(Method::PUT, path, Payload::Json(body)).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Payload<'_>,
    ) -> Result<ClientResponse> {
        let url = self.build_url(path)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            log_debug!(
                "[client] {} {} (attempt {}/{})",
                method,
                url,
                attempt,
                self.retry.max_attempts
            );

            match self.send(method.clone(), &url, payload).await {
                Ok(response) => {
                    self.stats.lock().await.record_success(response.status);
                    log_info!("[client] {} {} | Status: {}", method, url, response.status);
                    return Ok(response);
                }
                Err(e) => {
                    let status_code = match &e {
                        ClientError::ResponseError { status_code, .. } => Some(*status_code),
                        _ => None,
                    };
                    self.stats
                        .lock()
                        .await
                        .record_failure(url.clone(), e.to_string(), status_code);
                    log_error!("[client] {} {} failed on attempt {}: {}", method, url, attempt, e);

                    if !self.retry.should_retry(attempt) {
                        return Err(ClientError::RetriesExhausted {
                            url,
                            attempts: attempt,
                            last_error: e.to_string(),
                        }
                        .into());
                    }

                    let delay = self.retry.delay_after(attempt);
                    log_debug!("[client] Retrying {} in {:?}", url, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn build_url(&self, path: &str) -> Result<String> {
        let full_url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("Invalid path {}: {}", path, e)))?;

        Ok(full_url.to_string())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Payload<'_>,
    ) -> std::result::Result<ClientResponse, ClientError> {
        let request = self.inner.request(method, url).timeout(self.timeout);
        let request = match payload {
            Payload::Query(query) => request.query(query),
            Payload::Form(form) => request.form(form),
            Payload::Json(body) => request.json(body),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let is_success = response.status().is_success();
        let content = response.text().await.map_err(|e| {
            ClientError::RequestFailed(format!("Failed to get response text: {}", e))
        })?;

        if !is_success {
            return Err(ClientError::ResponseError {
                status_code: status,
                message: content.chars().take(200).collect(),
            });
        }

        Ok(ClientResponse { status, content })
    }

    pub async fn print_report(&self) {
        let stats = self.stats.lock().await;

        log_info!("=== Request Report ({}) ===", self.base_url);
        log_info!("Total Requests: {}", stats.total_requests);
        log_info!("Successful Requests: {}", stats.successful_requests);
        if stats.failed_requests > 0 {
            log_warn!("Failed Requests: {}", stats.failed_requests);
        }

        for (code, count) in &stats.status_codes {
            log_info!("  HTTP {}: {} requests", code, count);
        }

        for (url, reason) in stats.failed_urls.iter().take(20) {
            log_warn!("  ✗ {} (Reason: {})", url, reason);
        }
        if stats.failed_urls.len() > 20 {
            log_warn!("  ... and {} more failed URLs", stats.failed_urls.len() - 20);
        }
    }

    #[cfg(test)]
    pub(crate) async fn stats_snapshot(&self) -> (usize, usize, usize) {
        let stats = self.stats.lock().await;
        (
            stats.total_requests,
            stats.successful_requests,
            stats.failed_requests,
        )
    }
}

#[cfg(test)]
pub(crate) fn test_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}
