use std::time::Duration;

use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::SignupSource;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per call to `submit_with_retry`, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per attempt; an attempt still running after this is abandoned
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt number `attempt` (1-based): `base * 2^(n-1)`,
    /// capped at `max_delay`
    pub fn backoff(
        &self,
        attempt: u32,
    ) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    email: &'a str,
    source: SignupSource,
    attempt: u32,
}

#[derive(Deserialize)]
struct ServerError {
    error: Option<String>,
}

/// How the last attempt of a `submit_with_retry` call ended
#[derive(Debug)]
pub enum AttemptOutcome {
    Accepted,
    /// Non-2xx; `error` is the server's message, if the body had one
    Rejected {
        status: StatusCode,
        error: Option<String>,
    },
    /// No response at all (timeout, refused connection, ...)
    Failed(reqwest::Error),
}

#[derive(Debug)]
pub struct RetryReport {
    pub outcome: AttemptOutcome,
    /// Number of requests actually sent
    pub attempts: u32,
}

/// Talks to `POST /api/waitlist`. Cheap to clone; clones share a connection
/// pool.
#[derive(Debug, Clone)]
pub struct WaitlistClient {
    http_client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl WaitlistClient {
    pub fn new(
        base_url: &str,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(policy.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            endpoint: format!("{}/api/waitlist", base_url.trim_end_matches('/')),
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy { &self.policy }

    async fn send(
        &self,
        email: &str,
        source: SignupSource,
        attempt: u32,
    ) -> Result<Response, reqwest::Error> {
        self.http_client
            .post(&self.endpoint)
            .json(&SubmitBody {
                email,
                source,
                attempt,
            })
            .send()
            .await
    }

    /// Send the signup, retrying on transport failures, 5xx and 429 with
    /// exponential backoff. Any other 4xx ends the loop immediately.
    ///
    /// At most `budget` requests are sent (at least one). `previous_attempts`
    /// only offsets the `attempt` number reported to the server, so that a
    /// manual retry continues the count.
    #[tracing::instrument(skip(self, email), fields(endpoint = %self.endpoint))]
    pub async fn submit_with_retry(
        &self,
        email: &str,
        source: SignupSource,
        previous_attempts: u32,
        budget: u32,
    ) -> RetryReport {
        let budget = budget.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .send(email, source, previous_attempts + attempt)
                .await;

            let retryable = match &result {
                Ok(response) if response.status().is_success() => {
                    return RetryReport {
                        outcome: AttemptOutcome::Accepted,
                        attempts: attempt,
                    };
                }
                Ok(response) => {
                    response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS
                }
                Err(_) => true,
            };

            if !retryable || attempt >= budget {
                let outcome = match result {
                    Ok(response) => {
                        let status = response.status();
                        let error = response
                            .json::<ServerError>()
                            .await
                            .ok()
                            .and_then(|b| b.error);
                        AttemptOutcome::Rejected { status, error }
                    }
                    Err(e) => AttemptOutcome::Failed(e),
                };
                return RetryReport {
                    outcome,
                    attempts: attempt,
                };
            }

            let delay = self.policy.backoff(attempt);
            match &result {
                Ok(response) => tracing::warn!(
                    attempt,
                    status = %response.status(),
                    "waitlist submission failed, retrying in {delay:?}"
                ),
                Err(e) => tracing::warn!(
                    attempt,
                    error = %e,
                    "waitlist submission failed, retrying in {delay:?}"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}
