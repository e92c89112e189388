use crate::config::ViewportConfig;
use crate::viewport::layout::DocumentLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Near the viewport: render if the bitmap is stale.
    Render,
    /// Keep whatever bitmap exists, never refresh.
    Keep,
    /// Release the bitmap.
    Evict,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub render_buffer_factor: f32,
    pub keep_buffer_factor: f32,
    pub edge_snap_px: i32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::from_config(&ViewportConfig::default())
    }
}

impl WindowPolicy {
    pub fn from_config(config: &ViewportConfig) -> Self {
        Self {
            render_buffer_factor: config.render_buffer_factor,
            keep_buffer_factor: config.keep_buffer_factor,
            edge_snap_px: config.edge_snap_px,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportWindowManager {
    policy: WindowPolicy,
}

impl ViewportWindowManager {
    pub fn new(policy: WindowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Zone of every page for the given scroll offset and viewport extent.
    pub fn classify(&self, layout: &DocumentLayout, scroll: i32, extent: i32) -> Vec<Zone> {
        let count = layout.len();
        if count == 0 {
            return Vec::new();
        }
        let extent = extent.max(0);
        let (render_start, render_end) = self.render_span(layout, scroll, extent);
        let keep_buffer = buffer(extent, self.policy.keep_buffer_factor);
        let (keep_start, keep_end) = (scroll - keep_buffer, scroll + extent + keep_buffer);

        let max_scroll = layout.max_scroll(extent);
        let snap_first = scroll <= self.policy.edge_snap_px;
        let snap_last = scroll >= max_scroll - self.policy.edge_snap_px;

        (0..count)
            .map(|page| {
                let (top, bottom) = (layout.top(page), layout.bottom(page));
                let forced = (snap_first && page == 0) || (snap_last && page == count - 1);
                if forced || overlaps(top, bottom, render_start, render_end) {
                    Zone::Render
                } else if overlaps(top, bottom, keep_start, keep_end) {
                    Zone::Keep
                } else {
                    Zone::Evict
                }
            })
            .collect()
    }

    fn render_span(&self, layout: &DocumentLayout, scroll: i32, extent: i32) -> (i32, i32) {
        let render_buffer = buffer(extent, self.policy.render_buffer_factor);
        let start = (scroll - render_buffer).max(0);
        let end = (scroll + extent + render_buffer).min(layout.content_height());
        (start, end)
    }
}

fn buffer(extent: i32, factor: f32) -> i32 {
    (extent as f32 * factor).round() as i32
}

fn overlaps(top: i32, bottom: i32, start: i32, end: i32) -> bool {
    top <= end && bottom >= start
}

/// 1-based number of the page the reader is looking at.
///
/// Near the top of the document this is the first page and near the bottom
/// the last; otherwise it is the page under a reading line 20% down the
/// viewport, counting the gap below a page as part of it.
pub fn page_in_view(
    layout: &DocumentLayout,
    scroll: i32,
    viewport_height: i32,
    edge_snap_px: i32,
    page_spacing_px: i32,
) -> Option<usize> {
    let count = layout.len();
    if count == 0 {
        return None;
    }
    if scroll <= edge_snap_px {
        return Some(1);
    }
    if scroll >= layout.max_scroll(viewport_height) - edge_snap_px {
        return Some(count);
    }

    let reading_line = scroll + (f64::from(viewport_height) * 0.2) as i32;
    if let Some(page) = (0..count).find(|&page| {
        reading_line >= layout.top(page) && reading_line <= layout.bottom(page) + page_spacing_px
    }) {
        return Some(page + 1);
    }

    let middle = scroll + viewport_height / 2;
    (0..count)
        .find(|&page| middle < layout.bottom(page))
        .map(|page| page + 1)
}
