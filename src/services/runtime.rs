//! Tokio Runtime
//!
//! One process-wide multi-threaded runtime that hosts the bridge pump, the
//! backend and every cache operation.
//!
//! ## Pattern
//!
//! ```text
//! main thread
//!       │
//!       ▼
//! block_on(async { ... })          spawn_named("bridge-inbound", ...)
//!       │                                   │
//!       ▼                                   ▼
//! tokio::Runtime ◀──────────────────────────┘
//! ```

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

/// Global tokio runtime instance
static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or initialize the global tokio runtime
pub fn runtime() -> Result<&'static Runtime> {
    if let Some(runtime) = TOKIO_RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("keyspace-worker")
        .build()
        .map_err(|e| Error::invalid(format!("Failed to create tokio runtime: {e}")))?;

    // A concurrent initializer may have won; its runtime is used and ours dropped
    let _ = TOKIO_RUNTIME.set(runtime);
    TOKIO_RUNTIME
        .get()
        .ok_or_else(|| Error::invalid("tokio runtime unavailable"))
}

/// Spawn a detached task with a name (for debugging)
pub fn spawn_named<F>(name: &'static str, future: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::debug!(task = name, "Spawning tokio task");
    runtime()?.spawn(async move {
        future.await;
        tracing::debug!(task = name, "Tokio task completed");
    });
    Ok(())
}

/// Block on a future synchronously.
///
/// Blocks the calling thread; only for the process entry point.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    Ok(runtime()?.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_spawn_named_runs() {
        let flag = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::channel();

        let flag_clone = flag.clone();
        spawn_named("test-task", async move {
            flag_clone.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        })
        .expect("spawn");

        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("task finished");
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_block_on_returns_value() {
        let value = block_on(async { 40 + 2 }).expect("runtime");
        assert_eq!(value, 42);
    }
}
