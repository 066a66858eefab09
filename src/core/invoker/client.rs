use super::request::InferenceRequest;
use super::route::InferenceRoute;
use crate::error::InferenceError;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming client for the downstream inference service.
///
/// Only connection establishment is retried. Once the service answers, any
/// status (success or not) is final.
#[derive(Clone)]
pub struct InferenceClient {
    base_url: String,
    http: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl InferenceClient {
    /// `read_timeout` bounds the gap between body chunks, not the whole stream.
    pub fn new(base_url: impl Into<String>, read_timeout: Duration) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open the event stream for one run.
    pub async fn open_stream(
        &self,
        route: InferenceRoute,
        request: &InferenceRequest,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = format!("{}{}", self.base_url, route.path());
        let mut attempt = 0u32;

        let response = loop {
            attempt += 1;
            match self.http.post(&url).json(request).send().await {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt <= self.max_retries => {
                    tracing::warn!(
                        route = %route,
                        attempt,
                        "inference service connect failed, retrying: {e}"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) if e.is_connect() => {
                    return Err(InferenceError::Connect {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(InferenceError::Request(e.to_string())),
            }
        };

        if attempt > 1 {
            tracing::info!(route = %route, attempt, "inference service reachable after retries");
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}
