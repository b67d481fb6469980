//! Retry logic for transient SOAP errors.
//!
//! Provides exponential backoff for SOAP requests that fail with
//! transient faults (701, 714, 716) or timeouts.

use std::future::Future;
use std::time::Duration;

use super::soap::{SoapError, SoapResult};

/// Retry delays for transient SOAP errors (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes an idempotent SOAP request with retry logic for transient errors.
///
/// Retries on transient SOAP faults (701, 714, 716) and timeouts with
/// exponential backoff (200ms, 500ms, 1000ms). Any other error is returned
/// immediately.
///
/// # Arguments
/// * `action` - Action name for logging
/// * `operation` - Closure that performs the SOAP request
pub(crate) async fn with_retry<T, F, Fut>(action: &str, operation: F) -> SoapResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SoapResult<T>>,
{
    retry_while(action, operation, SoapError::is_transient).await
}

/// Executes a non-idempotent SOAP request, retrying only on transient UPnP
/// faults.
///
/// A timed-out request may already have been applied by the speaker, so
/// timeouts are returned without resending.
pub(crate) async fn with_fault_retry<T, F, Fut>(action: &str, operation: F) -> SoapResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SoapResult<T>>,
{
    retry_while(action, operation, SoapError::is_transient_fault).await
}

async fn retry_while<T, F, Fut>(
    action: &str,
    mut operation: F,
    retryable: fn(&SoapError) -> bool,
) -> SoapResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SoapResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if retryable(&e) && attempt < RETRY_DELAYS_MS.len() => {
                let delay_ms = RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!(
                    "[SOAP] {} transient error: {} (retry {}/{} in {}ms)",
                    action,
                    e,
                    attempt,
                    RETRY_DELAYS_MS.len(),
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_faults_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = with_retry("Play", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SoapError::Fault("UPnPError (errorCode 701)".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_all_delays() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = with_retry("Seek", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SoapError::Fault("UPnPError (errorCode 714)".into())) }
        })
        .await;

        assert!(matches!(result, Err(SoapError::Fault(_))));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_DELAYS_MS.len() + 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = with_retry("Stop", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SoapError::HttpStatus(404, String::new())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fault_retry_still_retries_upnp_faults() {
        let calls = AtomicUsize::new(0);
        let result = with_fault_retry("AddURIToQueue", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SoapError::Fault("UPnPError (errorCode 716)".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
