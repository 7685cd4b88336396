//! Blocking bridge over the async pipeline.
//!
//! Blocking calls run the same future as their async counterparts on a
//! fresh current-thread runtime, so both conventions share one code path.

use std::future::Future;

use crate::error::{QueryError, Result};

/// Drive `future` to completion on the calling thread.
///
/// # Errors
///
/// Returns [`QueryError::ConfigError`] if called from inside a tokio
/// runtime (blocking there would stall the executor) or if the runtime
/// cannot be created. Otherwise returns the future's own result.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(QueryError::ConfigError(
            "blocking call made from within an async runtime; use the async method instead"
                .to_string(),
        ));
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |e| QueryError::ConfigError(format!("failed to start blocking runtime: {e}")),
    )?;
    runtime.block_on(future)
}
