use std::future::Future;
use std::time::Duration;

use agw_domain::{Error, Result};

/// Bounded exponential backoff for the network edges (mail, SMS,
/// provider HTTP). Store and cache calls are never retried here.
pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 200;

/// Run `op` up to [`MAX_ATTEMPTS`] times, retrying only upstream
/// failures. Other errors pass through on the first occurrence.
pub async fn with_retries<T, F, Fut>(service: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err @ Error::Upstream { .. }) if attempt < MAX_ATTEMPTS => {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                tracing::warn!(service, attempt, delay_ms = delay, error = %err, "upstream call failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Map a reqwest failure onto the upstream arm of the taxonomy.
pub fn upstream_err(service: &str, err: reqwest::Error) -> Error {
    Error::Upstream {
        service: service.to_string(),
        // reqwest errors can embed URLs with credentials in the query;
        // keep only the classification.
        message: if err.is_timeout() {
            "timeout".to_string()
        } else if err.is_connect() {
            "connect failed".to_string()
        } else {
            format!("status {:?}", err.status())
        },
    }
}

/// Reject non-2xx responses as upstream failures.
pub fn check_status(service: &str, response: &reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::Upstream {
            service: service.to_string(),
            message: format!("status {}", response.status()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn upstream_errors_are_retried_then_surface() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("mail", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Upstream {
                    service: "mail".into(),
                    message: "boom".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_upstream_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("mail", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Validation("bad address".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
