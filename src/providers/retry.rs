// Retry logic with exponential backoff for transient transport failures

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::ProviderError;

const BASE_DELAY_MS: u64 = 1000;

/// Execute a provider request, retrying transient failures with exponential backoff.
///
/// `max_attempts` counts the first try; `1` disables retrying. Errors that
/// are not [`ProviderError::is_transient`] are returned immediately.
pub async fn with_retry<F, Fut, T>(max_attempts: u32, f: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}; retrying in {:?}",
                    attempt + 1,
                    max_attempts,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
