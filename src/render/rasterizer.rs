use tracing::{debug, instrument, warn};

use crate::backend::RgbaFrame;
use crate::config::{RenderConfig, SearchConfig};
use crate::error::{AppError, AppResult};
use crate::geometry::{PageRect, SizeF};
use crate::render::highlight::composite_highlights;
use crate::render::image_ops::downscale_to_fit;
use crate::render::scheduler::RenderTask;
use crate::session::DocumentSession;

/// Resolution limits and search options applied by every rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPolicy {
    pub max_width_px: f32,
    pub min_dpi: f32,
    pub max_dpi: f32,
    pub case_insensitive: bool,
}

impl Default for RasterPolicy {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default(), &SearchConfig::default())
    }
}

impl RasterPolicy {
    pub fn from_config(render: &RenderConfig, search: &SearchConfig) -> Self {
        Self {
            max_width_px: render.max_width_px,
            min_dpi: render.min_dpi,
            max_dpi: render.max_dpi,
            case_insensitive: search.case_insensitive,
        }
    }

    /// DPI used to rasterize a page of `natural_width` points shown
    /// `target_width` layout pixels wide.
    ///
    /// Moderate zooms are oversampled for sharper downscaling; the pixel
    /// width is capped at `max_width_px` and the result clamped to
    /// `[min_dpi, max_dpi]`.
    pub fn target_dpi(&self, target_width: f32, natural_width: f32, device_pixel_ratio: f32) -> f32 {
        if !(natural_width.is_finite() && natural_width > 0.0) {
            return self.min_dpi;
        }
        let zoom_level = target_width / natural_width;
        let quality_multiplier = if zoom_level > 2.0 {
            1.0
        } else if zoom_level > 1.2 {
            1.2
        } else {
            1.5
        };

        let mut dpi = 72.0 * zoom_level * device_pixel_ratio * quality_multiplier;
        if natural_width / 72.0 * dpi > self.max_width_px {
            dpi = self.max_width_px * 72.0 / natural_width;
        }
        dpi.clamp(self.min_dpi, self.max_dpi)
    }
}

/// Produces the bitmap for one render task, or `None` when the task cannot
/// be rendered (closed session, zero-size target, document failure).
#[instrument(skip_all, fields(page = task.page, session = task.session_id))]
pub(crate) fn rasterize_task(
    session: &DocumentSession,
    task: &RenderTask,
    policy: &RasterPolicy,
) -> Option<RgbaFrame> {
    match try_rasterize(session, task, policy) {
        Ok(Some(frame)) => Some(frame),
        Ok(None) => {
            debug!("render skipped");
            None
        }
        Err(err) => {
            warn!(%err, "render failed");
            None
        }
    }
}

fn try_rasterize(
    session: &DocumentSession,
    task: &RenderTask,
    policy: &RasterPolicy,
) -> AppResult<Option<RgbaFrame>> {
    if task.target_size.is_empty() {
        return Ok(None);
    }

    // Lock held only for the document calls.
    let Some(rendered) = session.with_document(|doc| -> AppResult<(SizeF, RgbaFrame)> {
        if task.page >= doc.page_count() {
            return Err(AppError::rasterize(task.page, "page index is out of range"));
        }
        let natural = doc.page_size(task.page)?;
        let dpi = policy.target_dpi(
            task.target_size.width as f32,
            natural.width,
            task.device_pixel_ratio,
        );
        let frame = doc.rasterize(task.page, dpi, dpi)?;
        Ok((natural, frame))
    }) else {
        return Ok(None);
    };
    let (natural, frame) = rendered?;

    let frame = downscale_to_fit(frame, task.target_size.scaled(task.device_pixel_ratio))?;

    if task.search_query.is_empty() {
        return Ok(Some(frame));
    }

    let Some(matches) = session.with_document(|doc| {
        doc.search(task.page, &task.search_query, policy.case_insensitive)
    }) else {
        return Ok(None);
    };
    let matches: Vec<PageRect> = matches?;

    composite_highlights(frame, natural, &matches, task.active_match.as_ref()).map(Some)
}
