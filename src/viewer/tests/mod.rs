mod search_flow;

use std::thread;
use std::time::{Duration, Instant};

use super::Viewer;
use crate::config::Config;
use crate::event::ViewerEvent;
use crate::search::SearchStatus;
use crate::session::DocumentSession;
use crate::testing::FakeDocument;

pub(super) fn new_viewer(workers: usize) -> Viewer {
    let mut config = Config::default();
    config.render.worker_threads = workers;
    let mut viewer = Viewer::new(config).expect("viewer should start");
    viewer.set_viewport_size(400, 300);
    viewer
}

pub(super) fn open(viewer: &mut Viewer, doc: FakeDocument) -> DocumentSession {
    let session = DocumentSession::new(Box::new(doc));
    viewer.open_session(session.clone());
    session
}

/// Fires pending debounce timers as if the user had stopped interacting.
pub(super) fn flush_timers(viewer: &mut Viewer) {
    viewer.tick(Instant::now() + Duration::from_secs(5));
}

pub(super) fn wait_until_settled(viewer: &mut Viewer) {
    let start = Instant::now();
    loop {
        viewer.pump();
        if viewer.in_flight() == 0 {
            return;
        }
        assert!(
            start.elapsed() <= Duration::from_secs(3),
            "timed out waiting for renders to settle"
        );
        thread::sleep(Duration::from_millis(10));
    }
}

pub(super) fn wait_for_search(viewer: &mut Viewer) {
    let start = Instant::now();
    loop {
        viewer.pump();
        if viewer.search().status() != SearchStatus::Searching {
            return;
        }
        assert!(
            start.elapsed() <= Duration::from_secs(3),
            "timed out waiting for search"
        );
        thread::sleep(Duration::from_millis(10));
    }
}

pub(super) fn found_pages(events: &[ViewerEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            ViewerEvent::PageFound { page, .. } => Some(*page),
            _ => None,
        })
        .collect()
}
