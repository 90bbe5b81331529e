use crate::config::RetryConfig;
use crate::error::{IndexError, LlmError, SourceQueryError};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tracing::warn;

pub trait Retryable {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(value: &RetryConfig) -> Self {
        Self {
            max_attempts: value.max_attempts,
            timeout: Duration::from_secs(value.timeout_secs),
            backoff: Duration::from_millis(value.backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Runs `call` with a per-attempt timeout. Only transient errors are retried,
    /// and never more than `max_attempts` times in total.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + From<Elapsed> + Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(elapsed) => Err(E::from(elapsed)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if attempt < attempts && error.is_transient() => {
                    warn!(operation, attempt, error = %error, "attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn is_transient_transport(error: &reqwest::Error) -> bool {
    if let Some(status) = error.status() {
        return is_transient_status(status.as_u16());
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

impl Retryable for IndexError {
    fn is_transient(&self) -> bool {
        match self {
            IndexError::Timeout(_) => true,
            IndexError::Http(error) => is_transient_transport(error),
            IndexError::BackendStatus { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

impl Retryable for SourceQueryError {
    fn is_transient(&self) -> bool {
        match self {
            SourceQueryError::Timeout(_) | SourceQueryError::RateLimited { .. } => true,
            SourceQueryError::Http(error) => is_transient_transport(error),
            SourceQueryError::Status { status, .. } => is_transient_status(*status),
            SourceQueryError::Parse { .. } => false,
        }
    }
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Http(error) => is_transient_transport(error),
            LlmError::Provider { status, .. } => is_transient_status(*status),
            LlmError::Authentication { .. } | LlmError::EmptyResponse => false,
        }
    }
}
