use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};

/// Blocking-task executor for background workers.
///
/// Reuses the ambient tokio runtime when one is running, otherwise owns a
/// private multi-threaded runtime.
pub(crate) struct WorkerRuntime {
    _owned: Option<Runtime>,
    handle: Handle,
}

impl WorkerRuntime {
    pub(crate) fn new(thread_name: &str) -> AppResult<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self {
                _owned: None,
                handle,
            });
        }

        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name(thread_name)
            .build()
            .map_err(|source| {
                AppError::io_with_context(source, format!("failed to start {thread_name} runtime"))
            })?;
        let handle = runtime.handle().clone();
        Ok(Self {
            _owned: Some(runtime),
            handle,
        })
    }

    pub(crate) fn spawn_blocking<F>(&self, task: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.spawn_blocking(task)
    }
}
