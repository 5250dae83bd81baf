//! Async orchestration over the ports.
//!
//! Services own no persistent state of their own; the store remains the
//! only durable record.

pub mod app;
pub mod executor;
pub mod push;
pub mod refresh;
pub mod signals;
pub mod snapshot;

use crate::domain::error::PolydashError;

/// Runs a synchronous store call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, PolydashError>
where
    F: FnOnce() -> Result<T, PolydashError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PolydashError::Store {
            reason: format!("blocking task failed: {e}"),
        })?
}
