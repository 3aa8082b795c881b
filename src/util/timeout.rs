//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::{LoginError, Result};

/// Await `future`, bounded by `limit` when one is given.
///
/// `None` waits indefinitely. An elapsed limit surfaces as
/// [`LoginError::CallbackTimeout`].
pub async fn with_optional_timeout<T>(
    limit: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        None => future.await,
        Some(duration) => match tokio::time::timeout(duration, future).await {
            Ok(result) => result,
            Err(_) => Err(LoginError::CallbackTimeout(duration.as_millis() as u64)),
        },
    }
}
