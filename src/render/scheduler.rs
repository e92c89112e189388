use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::backend::RgbaFrame;
use crate::error::AppResult;
use crate::geometry::{PageRect, PixelSize};
use crate::render::rasterizer::{RasterPolicy, rasterize_task};
use crate::runtime::WorkerRuntime;
use crate::session::DocumentSession;

/// Immutable description of one page render, moved into a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTask {
    pub session_id: u64,
    pub page: usize,
    pub target_size: PixelSize,
    pub device_pixel_ratio: f32,
    pub search_query: String,
    pub active_match: Option<PageRect>,
    pub expected_generation: u64,
}

/// A finished render, delivered to the coordinating thread.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub session_id: u64,
    pub page: usize,
    pub generation: u64,
    /// `None` when the render failed or was skipped.
    pub frame: Option<RgbaFrame>,
    pub elapsed: Duration,
}

enum RenderRequest {
    Task {
        task_id: u64,
        cancel_epoch: u64,
        session: DocumentSession,
        task: RenderTask,
    },
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct RenderResultEvent {
    task_id: u64,
    outcome: RenderOutcome,
}

#[derive(Debug, Clone, Copy)]
struct InFlightTask {
    page: usize,
    detached: bool,
}

/// Bounded pool of rasterization workers.
///
/// At most one attached task exists per page, and the number of tasks that
/// have not yet reported back (attached or detached) never exceeds the
/// worker count.
pub struct RenderScheduler {
    request_tx: flume::Sender<RenderRequest>,
    result_rx: flume::Receiver<RenderResultEvent>,
    in_flight: HashMap<u64, InFlightTask>,
    attached: HashMap<usize, u64>,
    cancel_epoch: Arc<AtomicU64>,
    _runtime: WorkerRuntime,
    workers: Vec<JoinHandle<()>>,
    worker_threads: usize,
    next_task_id: u64,
}

impl RenderScheduler {
    pub fn new(worker_threads: usize, policy: RasterPolicy) -> AppResult<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let (result_tx, result_rx) = flume::unbounded();
        let runtime = WorkerRuntime::new("pagescroll-render")?;
        let worker_threads = worker_threads.max(1);
        let cancel_epoch = Arc::new(AtomicU64::new(0));

        let workers = (0..worker_threads)
            .map(|_| {
                let request_rx = request_rx.clone();
                let result_tx = result_tx.clone();
                let cancel_epoch = Arc::clone(&cancel_epoch);
                runtime.spawn_blocking(move || {
                    render_worker_main(request_rx, result_tx, cancel_epoch, policy)
                })
            })
            .collect();
        debug!(worker_threads, "render scheduler started");

        Ok(Self {
            request_tx,
            result_rx,
            in_flight: HashMap::new(),
            attached: HashMap::new(),
            cancel_epoch,
            _runtime: runtime,
            workers,
            worker_threads,
            next_task_id: 1,
        })
    }

    /// Queues `task` unless its page already has an attached task or the
    /// pool is saturated. Returns whether the task was accepted.
    pub fn enqueue(&mut self, session: &DocumentSession, task: RenderTask) -> bool {
        if self.attached.contains_key(&task.page) || self.in_flight.len() >= self.worker_threads {
            return false;
        }
        let page = task.page;
        let task_id = self.next_task_id;
        self.next_task_id = self.next_task_id.saturating_add(1);

        let request = RenderRequest::Task {
            task_id,
            cancel_epoch: self.cancel_epoch.load(Ordering::SeqCst),
            session: session.clone(),
            task,
        };
        if self.request_tx.send(request).is_err() {
            return false;
        }
        self.in_flight.insert(
            task_id,
            InFlightTask {
                page,
                detached: false,
            },
        );
        self.attached.insert(page, task_id);
        trace!(page, task_id, "render task queued");
        true
    }

    pub fn has_in_flight(&self, page: usize) -> bool {
        self.attached.contains_key(&page)
    }

    /// Number of tasks that have not reported back yet, detached included.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Stops tracking the task for `page`; its result will be discarded.
    pub fn detach(&mut self, page: usize) -> bool {
        let Some(task_id) = self.attached.remove(&page) else {
            return false;
        };
        if let Some(entry) = self.in_flight.get_mut(&task_id) {
            entry.detached = true;
        }
        true
    }

    /// Detaches every outstanding task without waiting. Running tasks finish
    /// in the background and their results are dropped; queued ones are
    /// skipped. Returns how many tasks were detached.
    pub fn cancel_and_forget(&mut self) -> usize {
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        self.attached.clear();
        let mut detached = 0;
        for entry in self.in_flight.values_mut() {
            if !entry.detached {
                entry.detached = true;
                detached += 1;
            }
        }
        if detached > 0 {
            debug!(detached, "render tasks detached");
        }
        detached
    }

    /// Cancels every outstanding task and blocks until each has reported
    /// back. After this returns no worker holds a session clone.
    pub fn cancel_and_wait(&mut self) -> usize {
        let canceled = self.cancel_and_forget();
        while !self.in_flight.is_empty() {
            match self.result_rx.recv() {
                Ok(event) => {
                    self.in_flight.remove(&event.task_id);
                }
                Err(_) => {
                    self.in_flight.clear();
                    break;
                }
            }
        }
        canceled
    }

    pub(crate) fn accept_result_event(&mut self, event: RenderResultEvent) -> Option<RenderOutcome> {
        let entry = self.in_flight.remove(&event.task_id)?;
        if entry.detached {
            return None;
        }
        if self.attached.get(&entry.page) == Some(&event.task_id) {
            self.attached.remove(&entry.page);
        }
        Some(event.outcome)
    }

    /// Next finished attached task, if one is ready.
    pub fn try_recv_result(&mut self) -> Option<RenderOutcome> {
        while let Ok(event) = self.result_rx.try_recv() {
            if let Some(outcome) = self.accept_result_event(event) {
                return Some(outcome);
            }
        }
        None
    }

    /// Waits for the next finished attached task. Returns `None` once nothing
    /// is outstanding.
    pub async fn recv_result(&mut self) -> Option<RenderOutcome> {
        while !self.in_flight.is_empty() {
            let event = self.result_rx.recv_async().await.ok()?;
            if let Some(outcome) = self.accept_result_event(event) {
                return Some(outcome);
            }
        }
        None
    }

    fn shutdown(&mut self) {
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.worker_threads {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
        while let Some(worker) = self.workers.pop() {
            worker.abort();
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_worker_main(
    request_rx: flume::Receiver<RenderRequest>,
    result_tx: flume::Sender<RenderResultEvent>,
    cancel_epoch: Arc<AtomicU64>,
    policy: RasterPolicy,
) {
    while let Ok(request) = request_rx.recv() {
        let RenderRequest::Task {
            task_id,
            cancel_epoch: queued_epoch,
            session,
            task,
        } = request
        else {
            break;
        };

        let started = Instant::now();
        let frame = if cancel_epoch.load(Ordering::SeqCst) == queued_epoch {
            // A panicking backend still has to report, or the slot and the
            // page stay claimed forever.
            panic::catch_unwind(AssertUnwindSafe(|| rasterize_task(&session, &task, &policy)))
                .unwrap_or_else(|_| {
                    warn!(page = task.page, task_id, "render task panicked");
                    None
                })
        } else {
            trace!(page = task.page, task_id, "canceled render task skipped");
            None
        };
        drop(session);

        let event = RenderResultEvent {
            task_id,
            outcome: RenderOutcome {
                session_id: task.session_id,
                page: task.page,
                generation: task.expected_generation,
                frame,
                elapsed: started.elapsed(),
            },
        };
        if result_tx.send(event).is_err() {
            break;
        }
    }
}
