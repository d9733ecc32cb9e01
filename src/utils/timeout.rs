//! Timeout defaults and async timeout wrappers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Time a client has to go from accept to `PLAY`.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between server keep-alives in `PLAY`.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// A `PLAY` session that has not answered a keep-alive for this long is dropped.
pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for one identity verification request.
pub const AUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the shutdown fan-out to finish.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` with a deadline, mapping expiry onto `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(format!(
            "operation exceeded {}ms",
            duration.as_millis()
        ))),
    }
}
