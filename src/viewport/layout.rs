use tracing::debug;

use crate::config::ViewportConfig;
use crate::geometry::{PixelSize, SizeF};
use crate::render::cell::PageCell;
use crate::viewport::state::ViewportState;

/// Page size assumed when a document reports an unusable natural size.
pub const DEFAULT_PAGE_SIZE_PT: SizeF = SizeF::new(612.0, 792.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMetrics {
    pub page_margin_px: i32,
    pub page_spacing_px: i32,
    pub fit_margin_px: i32,
    pub min_fit_width_px: i32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self::from_config(&ViewportConfig::default())
    }
}

impl LayoutMetrics {
    pub fn from_config(config: &ViewportConfig) -> Self {
        Self {
            page_margin_px: config.page_margin_px,
            page_spacing_px: config.page_spacing_px,
            fit_margin_px: config.fit_margin_px,
            min_fit_width_px: config.min_fit_width_px,
        }
    }
}

/// Vertical placement of every cell in document coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLayout {
    tops: Vec<i32>,
    heights: Vec<i32>,
    content_height: i32,
}

impl DocumentLayout {
    pub fn from_heights(heights: impl IntoIterator<Item = i32>, metrics: &LayoutMetrics) -> Self {
        let heights: Vec<i32> = heights.into_iter().map(|height| height.max(0)).collect();
        let mut tops = Vec::with_capacity(heights.len());
        let mut cursor = metrics.page_margin_px;
        for (index, height) in heights.iter().enumerate() {
            if index > 0 {
                cursor += metrics.page_spacing_px;
            }
            tops.push(cursor);
            cursor += height;
        }
        let content_height = if heights.is_empty() {
            0
        } else {
            cursor + metrics.page_margin_px
        };
        Self {
            tops,
            heights,
            content_height,
        }
    }

    pub fn from_cells(cells: &[PageCell], metrics: &LayoutMetrics) -> Self {
        Self::from_heights(
            cells
                .iter()
                .map(|cell| i32::try_from(cell.target_size().height).unwrap_or(i32::MAX)),
            metrics,
        )
    }

    pub fn len(&self) -> usize {
        self.tops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tops.is_empty()
    }

    pub fn top(&self, page: usize) -> i32 {
        self.tops[page]
    }

    pub fn height(&self, page: usize) -> i32 {
        self.heights[page]
    }

    pub fn bottom(&self, page: usize) -> i32 {
        self.tops[page] + self.heights[page]
    }

    pub fn content_height(&self) -> i32 {
        self.content_height
    }

    pub fn max_scroll(&self, viewport_height: i32) -> i32 {
        (self.content_height - viewport_height.max(0)).max(0)
    }

    pub fn clamp_scroll(&self, scroll: i32, viewport_height: i32) -> i32 {
        scroll.clamp(0, self.max_scroll(viewport_height))
    }
}

/// Display size of a page for the current view mode.
pub fn target_size_for(natural: SizeF, state: &ViewportState, metrics: &LayoutMetrics) -> PixelSize {
    let natural = if natural.is_valid() {
        natural
    } else {
        DEFAULT_PAGE_SIZE_PT
    };

    if state.fit_width {
        let width = (state.viewport_width - metrics.fit_margin_px).max(metrics.min_fit_width_px);
        let height = (width as f32 * natural.height / natural.width).round();
        return PixelSize::new(width as u32, height.max(1.0) as u32);
    }

    let zoom = if state.zoom.is_finite() && state.zoom > 0.0 {
        state.zoom
    } else {
        1.0
    };
    PixelSize::new(
        (natural.width * zoom).round().max(1.0) as u32,
        (natural.height * zoom).round().max(1.0) as u32,
    )
}

/// A reading position expressed relative to one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    pub page: usize,
    pub fraction: f64,
}

impl ScrollAnchor {
    /// Anchors on the first page whose bottom lies below `scroll`, falling
    /// back to the last page.
    pub fn capture(layout: &DocumentLayout, scroll: i32) -> Option<Self> {
        if layout.is_empty() {
            return None;
        }
        let page = (0..layout.len())
            .find(|&page| scroll < layout.bottom(page))
            .unwrap_or(layout.len() - 1);
        let height = layout.height(page);
        let fraction = if height > 0 {
            f64::from(scroll - layout.top(page)) / f64::from(height)
        } else {
            0.0
        };
        Some(Self { page, fraction })
    }

    pub fn resolve(&self, layout: &DocumentLayout) -> i32 {
        if self.page >= layout.len() {
            return 0;
        }
        layout.top(self.page) + (f64::from(layout.height(self.page)) * self.fraction).round() as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relayout {
    pub layout: DocumentLayout,
    /// Cells whose target size changed.
    pub changed: usize,
}

/// Recomputes target sizes and keeps the reading position stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoomLayoutEngine {
    metrics: LayoutMetrics,
}

impl ZoomLayoutEngine {
    pub fn new(metrics: LayoutMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn relayout(
        &self,
        cells: &mut [PageCell],
        state: &mut ViewportState,
        previous: &DocumentLayout,
    ) -> Relayout {
        let anchor = ScrollAnchor::capture(previous, state.scroll_offset);

        let mut changed = 0;
        for cell in cells.iter_mut() {
            let target = target_size_for(cell.natural_size(), state, &self.metrics);
            if cell.resize(target) {
                changed += 1;
            }
        }

        let layout = DocumentLayout::from_cells(cells, &self.metrics);
        if let Some(anchor) = anchor
            && previous.len() == layout.len()
        {
            state.scroll_offset = anchor.resolve(&layout);
        }
        state.scroll_offset = layout.clamp_scroll(state.scroll_offset, state.viewport_height);
        if changed > 0 {
            debug!(changed, scroll = state.scroll_offset, "relayout");
        }

        Relayout { layout, changed }
    }
}
