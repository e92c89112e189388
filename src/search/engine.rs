use std::panic::{self, AssertUnwindSafe};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::geometry::PageRect;
use crate::runtime::WorkerRuntime;
use crate::search::cancel::CancelToken;
use crate::session::DocumentSession;

/// One match: a 0-based page and a page-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchMatch {
    pub page: usize,
    pub rect: PageRect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Completed {
        generation: u64,
        query: String,
        matches: Vec<SearchMatch>,
    },
    Canceled {
        generation: u64,
    },
}

impl SearchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Completed { generation, .. } | Self::Canceled { generation } => *generation,
        }
    }
}

struct SearchJob {
    generation: u64,
    session: DocumentSession,
    query: String,
    case_insensitive: bool,
    token: CancelToken,
}

enum WorkerRequest {
    Query(SearchJob),
    Shutdown,
}

/// Dedicated background worker that scans whole documents, one job at a
/// time, in submission order. Every job reports exactly one event.
pub struct SearchEngine {
    request_tx: flume::Sender<WorkerRequest>,
    event_rx: flume::Receiver<SearchEvent>,
    _runtime: WorkerRuntime,
    worker: Option<JoinHandle<()>>,
}

impl SearchEngine {
    pub fn new() -> AppResult<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();
        let runtime = WorkerRuntime::new("pagescroll-search")?;
        let worker = runtime.spawn_blocking(move || worker_main(request_rx, event_tx));

        Ok(Self {
            request_tx,
            event_rx,
            _runtime: runtime,
            worker: Some(worker),
        })
    }

    pub fn submit(
        &self,
        generation: u64,
        session: &DocumentSession,
        query: impl Into<String>,
        case_insensitive: bool,
        token: CancelToken,
    ) -> AppResult<()> {
        let job = SearchJob {
            generation,
            session: session.clone(),
            query: query.into(),
            case_insensitive,
            token,
        };
        self.request_tx
            .send(WorkerRequest::Query(job))
            .map_err(|_| AppError::unsupported("search worker is not available"))
    }

    pub fn drain_events(&self) -> Vec<SearchEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Blocks until the worker reports the next event.
    pub fn wait_event(&self) -> Option<SearchEvent> {
        self.event_rx.recv().ok()
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

fn worker_main(request_rx: flume::Receiver<WorkerRequest>, event_tx: flume::Sender<SearchEvent>) {
    while let Ok(WorkerRequest::Query(job)) = request_rx.recv() {
        let event = panic::catch_unwind(AssertUnwindSafe(|| run_job(&job))).unwrap_or_else(|_| {
            warn!(generation = job.generation, "search job panicked");
            SearchEvent::Canceled {
                generation: job.generation,
            }
        });
        drop(job);
        if event_tx.send(event).is_err() {
            break;
        }
    }
}

fn run_job(job: &SearchJob) -> SearchEvent {
    let canceled = SearchEvent::Canceled {
        generation: job.generation,
    };
    let page_count = job.session.page_count();
    let mut matches = Vec::new();

    for page in 0..page_count {
        if job.token.is_canceled() {
            debug!(generation = job.generation, page, "search canceled");
            return canceled;
        }

        let Some(found) = job
            .session
            .with_document(|doc| doc.search(page, &job.query, job.case_insensitive))
        else {
            debug!(generation = job.generation, "search session closed");
            return canceled;
        };

        match found {
            Ok(rects) => matches.extend(rects.into_iter().map(|rect| SearchMatch { page, rect })),
            Err(err) => warn!(%err, page, "search skipped page"),
        }
    }

    if job.token.is_canceled() {
        return canceled;
    }
    debug!(
        generation = job.generation,
        matches = matches.len(),
        "search completed"
    );
    SearchEvent::Completed {
        generation: job.generation,
        query: job.query.clone(),
        matches,
    }
}
