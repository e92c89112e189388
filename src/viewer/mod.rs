//! The coordinating viewer: sole writer of page cells.
//!
//! UI input arrives as method calls; render and search work runs on
//! background workers and comes back as plain values that are applied here.

mod debounce;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{DocumentLoader, HayroDocumentLoader};
use crate::config::Config;
use crate::error::AppResult;
use crate::event::ViewerEvent;
use crate::geometry::{PageRect, SizeF};
use crate::perf::RenderStats;
use crate::render::cell::PageCell;
use crate::render::rasterizer::RasterPolicy;
use crate::render::scheduler::{RenderOutcome, RenderScheduler, RenderTask};
use crate::search::coordinator::{SearchCoordinator, SearchStatus};
use crate::session::DocumentSession;
use crate::viewport::layout::{
    DEFAULT_PAGE_SIZE_PT, DocumentLayout, LayoutMetrics, ZoomLayoutEngine,
};
use crate::viewport::state::ViewportState;
use crate::viewport::window::{ViewportWindowManager, WindowPolicy, Zone, page_in_view};
use debounce::Debounce;

/// Pixels scrolled per standard wheel notch (120 units).
const WHEEL_NOTCH_PX: f32 = 60.0;
const WHEEL_NOTCH_UNITS: f32 = 120.0;

#[derive(Debug, Clone, Default, PartialEq)]
struct HighlightState {
    query: String,
    /// Page and rectangle of the current match.
    active: Option<(usize, PageRect)>,
}

pub struct Viewer {
    config: Config,
    loader: Arc<dyn DocumentLoader>,
    session: Option<DocumentSession>,
    cells: Vec<PageCell>,
    layout: DocumentLayout,
    state: ViewportState,
    layout_engine: ZoomLayoutEngine,
    window: ViewportWindowManager,
    scheduler: RenderScheduler,
    search: SearchCoordinator,
    highlight: HighlightState,
    epoch: u64,
    page_in_view: Option<usize>,
    scroll_timer: Debounce,
    resize_timer: Debounce,
    events: VecDeque<ViewerEvent>,
    stats: RenderStats,
}

impl Viewer {
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_loader(config, Arc::new(HayroDocumentLoader))
    }

    pub fn with_loader(config: Config, loader: Arc<dyn DocumentLoader>) -> AppResult<Self> {
        let config = config.sanitized();
        let scheduler = RenderScheduler::new(
            config.render.effective_worker_threads(),
            RasterPolicy::from_config(&config.render, &config.search),
        )?;
        let search = SearchCoordinator::new(config.search.case_insensitive)?;
        let state = ViewportState {
            device_pixel_ratio: config.render.device_pixel_ratio,
            ..ViewportState::default()
        };

        Ok(Self {
            layout_engine: ZoomLayoutEngine::new(LayoutMetrics::from_config(&config.viewport)),
            window: ViewportWindowManager::new(WindowPolicy::from_config(&config.viewport)),
            scroll_timer: Debounce::new(Duration::from_millis(config.viewport.scroll_debounce_ms)),
            resize_timer: Debounce::new(Duration::from_millis(config.viewport.resize_debounce_ms)),
            config,
            loader,
            session: None,
            cells: Vec::new(),
            layout: DocumentLayout::default(),
            state,
            scheduler,
            search,
            highlight: HighlightState::default(),
            epoch: 0,
            page_in_view: None,
            events: VecDeque::new(),
            stats: RenderStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[PageCell] {
        &self.cells
    }

    pub fn cell(&self, page: usize) -> Option<&PageCell> {
        self.cells.get(page)
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    /// Current render epoch; a cell is up to date when it was rendered for it.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 1-based page currently in view.
    pub fn page_in_view(&self) -> Option<usize> {
        self.page_in_view
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn search(&self) -> &SearchCoordinator {
        &self.search
    }

    pub fn highlight_query(&self) -> &str {
        &self.highlight.query
    }

    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight_len()
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    /// Opens `path` and replaces the current document. On failure the
    /// current document stays open.
    pub fn open_document(&mut self, path: impl AsRef<Path>) -> AppResult<()> {
        let session = DocumentSession::open(self.loader.as_ref(), path)?;
        self.open_session(session);
        Ok(())
    }

    pub fn open_session(&mut self, session: DocumentSession) {
        self.teardown();

        let page_count = session.page_count();
        let sizes = session
            .with_document(|doc| {
                (0..page_count)
                    .map(|page| match doc.page_size(page) {
                        Ok(size) if size.is_valid() => size,
                        Ok(_) | Err(_) => {
                            warn!(page, "unusable page size; using default");
                            DEFAULT_PAGE_SIZE_PT
                        }
                    })
                    .collect::<Vec<SizeF>>()
            })
            .unwrap_or_default();

        self.cells = sizes
            .into_iter()
            .enumerate()
            .map(|(index, size)| PageCell::new(index, size))
            .collect();
        info!(
            path = %session.path().display(),
            pages = self.cells.len(),
            "document opened"
        );
        self.session = Some(session);
        self.epoch = self.epoch.saturating_add(1);
        self.state.scroll_offset = 0;
        self.events.push_back(ViewerEvent::DocumentOpened {
            page_count: self.cells.len(),
        });
        self.perform_zoom_or_resize();
    }

    pub fn close_document(&mut self) {
        if self.teardown() {
            self.events.push_back(ViewerEvent::DocumentClosed);
        }
    }

    /// Stops all background work touching the current session, then
    /// destroys it. Returns whether a document was open.
    fn teardown(&mut self) -> bool {
        self.search.cancel_and_wait();
        if self.search.status() != SearchStatus::Idle || !self.highlight.query.is_empty() {
            self.events.push_back(self.search.reset());
        }
        let canceled = self.scheduler.cancel_and_wait();
        self.stats.add_canceled_tasks(canceled);
        self.stats.set_queue_depth(0);

        self.cells.clear();
        self.layout = DocumentLayout::default();
        self.highlight = HighlightState::default();
        self.page_in_view = None;
        self.scroll_timer.cancel();
        self.resize_timer.cancel();

        let Some(session) = self.session.take() else {
            return false;
        };
        session.close();
        debug!(id = session.id(), "document torn down");
        true
    }

    pub fn set_scroll_offset(&mut self, offset: i32) {
        self.set_scroll_offset_at(offset, Instant::now());
    }

    fn set_scroll_offset_at(&mut self, offset: i32, now: Instant) {
        let offset = self
            .layout
            .clamp_scroll(offset, self.state.viewport_height);
        if offset == self.state.scroll_offset {
            return;
        }
        self.state.scroll_offset = offset;
        self.refresh_page_in_view();
        self.scroll_timer.arm(now);
    }

    pub fn scroll_by(&mut self, delta: i32) {
        self.set_scroll_offset(self.state.scroll_offset.saturating_add(delta));
    }

    /// Wheel input in standard units (120 per notch, positive away from the
    /// user). With `ctrl` held the viewer asks the embedder to zoom instead.
    pub fn on_wheel(&mut self, delta_y: i32, ctrl: bool) {
        if ctrl {
            self.events.push_back(ViewerEvent::ZoomRequested {
                zoom_in: delta_y > 0,
            });
            return;
        }
        let pixels = (delta_y as f32 / WHEEL_NOTCH_UNITS * WHEEL_NOTCH_PX).round() as i32;
        self.scroll_by(-pixels);
    }

    pub fn set_viewport_size(&mut self, width: i32, height: i32) {
        let (width, height) = (width.max(0), height.max(0));
        if width == self.state.viewport_width && height == self.state.viewport_height {
            return;
        }
        self.state.viewport_width = width;
        self.state.viewport_height = height;
        if !self.cells.is_empty() {
            self.resize_timer.arm(Instant::now());
        }
    }

    fn on_resize_settled(&mut self) {
        if self.state.fit_width {
            self.perform_zoom_or_resize();
            return;
        }
        self.state.scroll_offset = self
            .layout
            .clamp_scroll(self.state.scroll_offset, self.state.viewport_height);
        self.refresh_page_in_view();
        self.update_visible_pages();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if !zoom.is_finite() {
            return;
        }
        let viewport = &self.config.viewport;
        let zoom = zoom.clamp(viewport.min_zoom, viewport.max_zoom);
        if zoom == self.state.zoom {
            return;
        }
        self.state.zoom = zoom;
        if !self.state.fit_width {
            self.perform_zoom_or_resize();
        }
    }

    /// Leaves fit-width mode and moves the zoom one step.
    pub fn step_zoom(&mut self, zoom_in: bool) {
        let step = self.config.viewport.zoom_step;
        let delta = if zoom_in { step } else { -step };
        let zoom = ((self.state.zoom + delta) * 100.0).round() / 100.0;
        if self.state.fit_width {
            self.state.fit_width = false;
            self.state.zoom = zoom.clamp(self.config.viewport.min_zoom, self.config.viewport.max_zoom);
            self.perform_zoom_or_resize();
        } else {
            self.set_zoom(zoom);
        }
    }

    pub fn set_fit_width(&mut self, fit_width: bool) {
        if fit_width == self.state.fit_width {
            return;
        }
        self.state.fit_width = fit_width;
        self.perform_zoom_or_resize();
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if !(ratio.is_finite() && ratio > 0.0) || ratio == self.state.device_pixel_ratio {
            return;
        }
        self.state.device_pixel_ratio = ratio;
        if !self.cells.is_empty() {
            self.invalidate_renders();
            self.update_visible_pages();
        }
    }

    /// Scrolls to a 1-based page. A positive `y_fraction` targets that point
    /// inside the page, placed a quarter of the way down the viewport.
    pub fn go_to_page(&mut self, page_number: usize, y_fraction: f64) {
        if page_number == 0 || page_number > self.cells.len() {
            return;
        }
        let index = page_number - 1;
        let mut offset = self.layout.top(index);
        if y_fraction > 0.0 {
            offset += (f64::from(self.layout.height(index)) * y_fraction) as i32;
            offset -= self.state.viewport_height / 4;
        }
        self.set_scroll_offset(offset);
    }

    fn perform_zoom_or_resize(&mut self) {
        if self.cells.is_empty() {
            return;
        }
        let previous = std::mem::take(&mut self.layout);
        let relayout = self
            .layout_engine
            .relayout(&mut self.cells, &mut self.state, &previous);
        self.layout = relayout.layout;
        if relayout.changed > 0 {
            self.invalidate_renders();
        }
        self.refresh_page_in_view();
        self.update_visible_pages();
    }

    /// Moves to a new render epoch. Outstanding renders are detached; their
    /// results will not be applied.
    fn invalidate_renders(&mut self) {
        self.epoch = self.epoch.saturating_add(1);
        let canceled = self.scheduler.cancel_and_forget();
        self.stats.add_canceled_tasks(canceled);
        for cell in &mut self.cells {
            cell.set_loading(false);
        }
    }

    fn refresh_page_in_view(&mut self) {
        let page = page_in_view(
            &self.layout,
            self.state.scroll_offset,
            self.state.viewport_height,
            self.config.viewport.edge_snap_px,
            self.config.viewport.page_spacing_px,
        );
        if page.is_some() && page != self.page_in_view {
            self.page_in_view = page;
            if let Some(page) = page {
                self.events.push_back(ViewerEvent::PageInViewChanged(page));
            }
        }
    }

    /// Requests stale pages near the viewport, nearest first, and releases
    /// bitmaps far away from it.
    pub fn update_visible_pages(&mut self) {
        if self.session.is_none() || self.cells.is_empty() {
            return;
        }
        let zones = self.window.classify(
            &self.layout,
            self.state.scroll_offset,
            self.state.viewport_height,
        );

        let center = self.state.scroll_offset + self.state.viewport_height / 2;
        let mut wanted: Vec<usize> = zones
            .iter()
            .enumerate()
            .filter(|&(page, zone)| {
                let cell = &self.cells[page];
                *zone == Zone::Render && !cell.is_loading() && cell.needs_render(self.epoch)
            })
            .map(|(page, _)| page)
            .collect();
        wanted.sort_by_key(|&page| {
            let middle = self.layout.top(page) + self.layout.height(page) / 2;
            (middle - center).abs()
        });

        for page in wanted {
            if !self.request_render(page)
                && self.scheduler.in_flight_len() >= self.scheduler.worker_threads()
            {
                break;
            }
        }

        let mut evicted = 0;
        let mut detached = 0;
        for (page, (cell, zone)) in self.cells.iter_mut().zip(&zones).enumerate() {
            if *zone != Zone::Evict {
                continue;
            }
            // The worker keeps running; its result is dropped on arrival.
            if cell.is_loading() && self.scheduler.detach(page) {
                cell.set_loading(false);
                detached += 1;
            }
            if cell.evict() {
                evicted += 1;
            }
        }
        if detached > 0 {
            debug!(detached, "renders of far pages detached");
        }
        if evicted > 0 {
            debug!(evicted, "bitmaps released");
            self.stats.record_evicted(evicted);
        }
    }

    /// Dispatches a render of `page` with the current view state. Returns
    /// false when the page already has a render outstanding, the pool is
    /// saturated, or the page has no area.
    pub fn request_render(&mut self, page: usize) -> bool {
        assert!(
            page < self.cells.len(),
            "render requested for page {page} of {}",
            self.cells.len()
        );
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let target_size = self.cells[page].target_size();
        if target_size.is_empty() {
            return false;
        }

        let task = RenderTask {
            session_id: session.id(),
            page,
            target_size,
            device_pixel_ratio: self.state.device_pixel_ratio,
            search_query: self.highlight.query.clone(),
            active_match: self
                .highlight
                .active
                .and_then(|(active_page, rect)| (active_page == page).then_some(rect)),
            expected_generation: self.epoch,
        };
        if !self.scheduler.enqueue(session, task) {
            return false;
        }
        self.cells[page].set_loading(true);
        self.stats.set_queue_depth(self.scheduler.in_flight_len());
        true
    }

    fn apply_render_outcome(&mut self, outcome: RenderOutcome) {
        self.stats.record_render(outcome.elapsed);
        self.stats.set_queue_depth(self.scheduler.in_flight_len());

        let current_session = self.session.as_ref().map(DocumentSession::id);
        if current_session != Some(outcome.session_id) {
            self.stats.record_stale();
            return;
        }
        let Some(cell) = self.cells.get_mut(outcome.page) else {
            self.stats.record_stale();
            return;
        };
        cell.set_loading(false);

        if outcome.generation != self.epoch {
            debug!(
                page = outcome.page,
                generation = outcome.generation,
                epoch = self.epoch,
                "stale render discarded"
            );
            self.stats.record_stale();
            return;
        }
        let Some(frame) = outcome.frame else {
            self.stats.record_failed();
            return;
        };

        cell.install(frame, self.epoch);
        self.stats.record_completed();
        self.events.push_back(ViewerEvent::CellUpdated(outcome.page));
    }

    /// Fires due debounce timers.
    pub fn tick(&mut self, now: Instant) {
        if self.resize_timer.fire(now) {
            self.on_resize_settled();
        }
        if self.scroll_timer.fire(now) {
            self.update_visible_pages();
        }
    }

    /// Earliest pending timer deadline, for event loops that sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.resize_timer.deadline(), self.scroll_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn has_pending_timers(&self) -> bool {
        self.resize_timer.is_armed() || self.scroll_timer.is_armed()
    }

    /// Applies every finished render and search result without blocking.
    /// Returns the number of renders applied.
    pub fn pump(&mut self) -> usize {
        let before = self.scheduler.in_flight_len();
        let mut applied = 0;
        let mut installed = false;
        while let Some(outcome) = self.scheduler.try_recv_result() {
            installed |= outcome.frame.is_some();
            self.apply_render_outcome(outcome);
            applied += 1;
        }
        let detached_done = before.saturating_sub(self.scheduler.in_flight_len()) > applied;
        if installed || detached_done {
            self.update_visible_pages();
        }

        for event in self.search.poll() {
            self.handle_search_event(event);
        }
        applied
    }

    /// Waits for the next render to finish and applies it. Returns the page
    /// index, or `None` when nothing is outstanding.
    pub async fn next_render(&mut self) -> Option<usize> {
        let before = self.scheduler.in_flight_len();
        let outcome = self.scheduler.recv_result().await;
        let detached_done =
            before.saturating_sub(self.scheduler.in_flight_len()) > usize::from(outcome.is_some());
        let installed = outcome.as_ref().is_some_and(|outcome| outcome.frame.is_some());
        let page = outcome.map(|outcome| {
            let page = outcome.page;
            self.apply_render_outcome(outcome);
            page
        });
        if installed || detached_done {
            self.update_visible_pages();
        }
        page
    }

    /// Runs pending debounced work immediately and waits until no render is
    /// outstanding. Returns false if `timeout` elapsed first.
    pub async fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.has_pending_timers() {
                self.tick(Instant::now() + Duration::from_secs(3600));
            }
            if self.scheduler.in_flight_len() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, self.next_render())
                .await
                .is_err()
            {
                return false;
            }
        }
    }

    pub fn start_search(&mut self, query: &str) {
        let events = self.search.start_search(self.session.as_ref(), query);
        for event in events {
            self.handle_search_event(event);
        }
    }

    pub fn search_next(&mut self) {
        if let Some(event) = self.search.next() {
            self.handle_search_event(event);
        }
    }

    pub fn search_prev(&mut self) {
        if let Some(event) = self.search.prev() {
            self.handle_search_event(event);
        }
    }

    pub fn reset_search(&mut self) {
        let event = self.search.reset();
        self.handle_search_event(event);
    }

    fn handle_search_event(&mut self, event: ViewerEvent) {
        match &event {
            ViewerEvent::PageFound { page, query, rect } => {
                self.on_page_found(*page, query, *rect);
            }
            ViewerEvent::SearchReset => self.clear_highlight(),
            _ => {}
        }
        self.events.push_back(event);
    }

    fn on_page_found(&mut self, page: usize, query: &str, rect: PageRect) {
        let Some(cell) = self.cells.get(page) else {
            warn!(page, "match outside the document ignored");
            return;
        };
        let natural_height = cell.natural_size().height;

        let highlight = HighlightState {
            query: query.to_string(),
            active: Some((page, rect)),
        };
        if highlight != self.highlight {
            self.highlight = highlight;
            self.mark_highlight_stale();
        }

        let y_fraction = f64::from(rect.y / natural_height);
        self.go_to_page(page + 1, y_fraction);
        self.update_visible_pages();
    }

    fn clear_highlight(&mut self) {
        if self.highlight.query.is_empty() {
            return;
        }
        self.highlight = HighlightState::default();
        self.mark_highlight_stale();
        self.update_visible_pages();
    }

    /// Every bitmap keeps showing until its page is visible and re-rendered.
    fn mark_highlight_stale(&mut self) {
        self.invalidate_renders();
        for cell in &mut self.cells {
            cell.mark_highlight_stale();
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.teardown();
    }
}
