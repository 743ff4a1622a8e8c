use crate::config::ClientConfig;
use crate::sources::error::SourceError;
use log::{debug, warn};
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// JSON-over-HTTP GET with retries on transient failures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    max_retries: u32,
    backoff_factor: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
        }
    }

    /// GETs `url` with `query` and deserializes the body.
    /// Non-JSON or wrongly shaped bodies are reported as [`SourceError::JsonParse`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let body = self.get_bytes(url, query).await?;
        serde_json::from_slice(&body).map_err(|source| SourceError::JsonParse {
            url: url.to_string(),
            source,
        })
    }

    async fn get_bytes(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, SourceError> {
        let mut attempt = 0;
        loop {
            match self.try_get(url, query).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "Request to {} failed ({}), retry {}/{} in {:?}",
                        url, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `backoff_factor * 2^(attempt - 1)`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_factor
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }

    async fn try_get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, SourceError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| SourceError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    SourceError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    SourceError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::ResponseBody(url.to_string(), e))?;
        Ok(body.to_vec())
    }
}

fn is_transient(error: &SourceError) -> bool {
    match error {
        SourceError::NetworkRequest(..) | SourceError::ResponseBody(..) => true,
        SourceError::HttpStatus { status, .. } => {
            status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
        }
        _ => false,
    }
}
