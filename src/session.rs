//! The document session: sole owner of a document model and its lock.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::{DocumentLoader, DocumentModel};
use crate::error::AppResult;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to one open document.
///
/// Clones share the same model and lock. Every access goes through
/// [`DocumentSession::with_document`], which releases the lock on every exit
/// path. After [`DocumentSession::close`] the model is destroyed and every
/// later access observes `None`, so a worker holding a stale clone can never
/// reach a destroyed or replaced document.
#[derive(Clone)]
pub struct DocumentSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: u64,
    path: PathBuf,
    page_count: usize,
    document: Mutex<Option<Box<dyn DocumentModel>>>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("page_count", &self.inner.page_count)
            .finish()
    }
}

impl DocumentSession {
    pub fn new(document: Box<dyn DocumentModel>) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let path = document.path().to_path_buf();
        let page_count = document.page_count();
        debug!(id, path = %path.display(), page_count, "document session created");
        Self {
            inner: Arc::new(SessionInner {
                id,
                path,
                page_count,
                document: Mutex::new(Some(document)),
            }),
        }
    }

    pub fn open(loader: &dyn DocumentLoader, path: impl AsRef<Path>) -> AppResult<Self> {
        loader.open(path.as_ref()).map(Self::new)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn page_count(&self) -> usize {
        self.inner.page_count
    }

    /// Runs `access` with exclusive access to the document.
    ///
    /// Returns `None` once the session has been closed.
    pub fn with_document<R>(&self, access: impl FnOnce(&dyn DocumentModel) -> R) -> Option<R> {
        let guard = self.lock();
        let document = guard.as_deref()?;
        Some(access(document))
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Destroys the document model. Waits for an in-progress access to finish.
    pub fn close(&self) {
        let document = self.lock().take();
        if document.is_some() {
            debug!(id = self.inner.id, "document session closed");
        }
    }

    // A panic inside a document call leaves the model usable for the next
    // caller; the poison flag carries no extra meaning here.
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn DocumentModel>>> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::geometry::SizeF;
    use crate::testing::{FakeDocument, Gate};

    use super::DocumentSession;

    #[test]
    fn sessions_get_distinct_ids_and_report_page_count() {
        let first = DocumentSession::new(Box::new(FakeDocument::uniform(
            3,
            SizeF::new(100.0, 100.0),
        )));
        let second = DocumentSession::new(Box::new(FakeDocument::uniform(
            5,
            SizeF::new(100.0, 100.0),
        )));

        assert_ne!(first.id(), second.id());
        assert_eq!(first.page_count(), 3);
        assert_eq!(second.page_count(), 5);
    }

    #[test]
    fn access_after_close_observes_none() {
        let session = DocumentSession::new(Box::new(FakeDocument::uniform(
            2,
            SizeF::new(100.0, 50.0),
        )));
        let clone = session.clone();

        let size = session.with_document(|doc| doc.page_size(1).expect("size"));
        assert_eq!(size, Some(SizeF::new(100.0, 50.0)));

        session.close();
        assert!(!clone.is_open());
        assert!(clone.with_document(|doc| doc.page_count()).is_none());
    }

    #[test]
    fn close_waits_for_in_progress_access() {
        let gate = Gate::closed();
        let doc = FakeDocument::uniform(1, SizeF::new(10.0, 10.0)).with_gate(gate.clone());
        let log = doc.log();
        let session = DocumentSession::new(Box::new(doc));

        let worker_session = session.clone();
        let worker = thread::spawn(move || {
            worker_session.with_document(|doc| doc.rasterize(0, 72.0, 72.0).is_ok())
        });

        let start = Instant::now();
        while log.peak_active.load(Ordering::SeqCst) == 0 {
            assert!(
                start.elapsed() <= Duration::from_secs(3),
                "timed out waiting for worker access"
            );
            thread::sleep(Duration::from_millis(5));
        }
        let opener = {
            let gate = gate.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                gate.open();
            })
        };
        session.close();

        assert_eq!(worker.join().expect("worker should finish"), Some(true));
        opener.join().expect("opener should finish");
        assert!(!session.is_open());
    }
}
