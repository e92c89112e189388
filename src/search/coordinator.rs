use tracing::{debug, warn};

use crate::error::AppResult;
use crate::event::ViewerEvent;
use crate::search::cancel::CancelToken;
use crate::search::engine::{SearchEngine, SearchEvent, SearchMatch};
use crate::session::DocumentSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
    Completed,
    Canceled,
}

/// State of the current query.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    pub query: String,
    pub token: CancelToken,
    pub matches: Vec<SearchMatch>,
    pub current: Option<usize>,
}

/// Runs full-document searches in the background and navigates the results.
///
/// Only results of the latest run are installed; a canceled or superseded
/// run never leaves partial matches behind.
pub struct SearchCoordinator {
    engine: SearchEngine,
    case_insensitive: bool,
    status: SearchStatus,
    session: SearchSession,
    generation: u64,
    outstanding: usize,
}

impl SearchCoordinator {
    pub fn new(case_insensitive: bool) -> AppResult<Self> {
        Ok(Self {
            engine: SearchEngine::new()?,
            case_insensitive,
            status: SearchStatus::Idle,
            session: SearchSession::default(),
            generation: 0,
            outstanding: 0,
        })
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn query(&self) -> &str {
        &self.session.query
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.session.matches
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session.current
    }

    pub fn current_match(&self) -> Option<&SearchMatch> {
        self.session.current.and_then(|index| self.session.matches.get(index))
    }

    /// Starts a new run for `query`. Blank queries and a missing document
    /// are ignored.
    pub fn start_search(
        &mut self,
        document: Option<&DocumentSession>,
        query: &str,
    ) -> Vec<ViewerEvent> {
        let Some(document) = document else {
            return Vec::new();
        };
        if query.trim().is_empty() {
            return Vec::new();
        }

        let events = vec![self.reset()];
        self.generation = self.generation.saturating_add(1);
        let token = CancelToken::new();
        if let Err(err) = self.engine.submit(
            self.generation,
            document,
            query,
            self.case_insensitive,
            token.clone(),
        ) {
            warn!(%err, "search could not be started");
            return events;
        }

        self.outstanding += 1;
        self.status = SearchStatus::Searching;
        self.session = SearchSession {
            query: query.to_string(),
            token,
            matches: Vec::new(),
            current: None,
        };
        debug!(generation = self.generation, query, "search started");
        events
    }

    /// Installs finished results. Must be called on the coordinating thread.
    pub fn poll(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        for event in self.engine.drain_events() {
            if let Some(found) = self.accept(event) {
                events.push(found);
            }
        }
        events
    }

    fn accept(&mut self, event: SearchEvent) -> Option<ViewerEvent> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if event.generation() != self.generation || self.status != SearchStatus::Searching {
            return None;
        }

        match event {
            SearchEvent::Canceled { .. } => {
                self.status = SearchStatus::Canceled;
                None
            }
            SearchEvent::Completed { .. } if self.session.token.is_canceled() => {
                self.status = SearchStatus::Canceled;
                None
            }
            SearchEvent::Completed { query, matches, .. } => {
                self.status = SearchStatus::Completed;
                self.session.matches = matches;
                if self.session.matches.is_empty() {
                    return Some(ViewerEvent::SearchEmpty { query });
                }
                self.session.current = Some(0);
                self.found_event()
            }
        }
    }

    /// Moves to the following match, wrapping to the first.
    pub fn next(&mut self) -> Option<ViewerEvent> {
        let total = self.session.matches.len();
        if total == 0 {
            return None;
        }
        self.session.current = Some(match self.session.current {
            Some(index) => (index + 1) % total,
            None => 0,
        });
        self.found_event()
    }

    /// Moves to the preceding match, wrapping to the last.
    pub fn prev(&mut self) -> Option<ViewerEvent> {
        let total = self.session.matches.len();
        if total == 0 {
            return None;
        }
        self.session.current = Some(match self.session.current {
            Some(index) => (index + total - 1) % total,
            None => total - 1,
        });
        self.found_event()
    }

    fn found_event(&self) -> Option<ViewerEvent> {
        self.current_match().map(|found| ViewerEvent::PageFound {
            page: found.page,
            query: self.session.query.clone(),
            rect: found.rect,
        })
    }

    /// Cancels any run and forgets the results.
    pub fn reset(&mut self) -> ViewerEvent {
        self.session.token.cancel();
        self.session.matches.clear();
        self.session.current = None;
        self.status = SearchStatus::Idle;
        ViewerEvent::SearchReset
    }

    /// Cancels the current run and blocks until the worker no longer holds
    /// any document session.
    pub fn cancel_and_wait(&mut self) {
        self.session.token.cancel();
        if self.status == SearchStatus::Searching {
            self.status = SearchStatus::Canceled;
        }
        while self.outstanding > 0 {
            if self.engine.wait_event().is_none() {
                break;
            }
            self.outstanding -= 1;
        }
        self.outstanding = 0;
    }
}
