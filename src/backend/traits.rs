use std::path::Path;
use std::sync::Arc;

use crate::error::AppResult;
use crate::geometry::{PageRect, SizeF};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl RgbaFrame {
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels_to_vec(&self) -> Vec<u8> {
        self.pixels.as_ref().to_vec()
    }
}

/// A paginated document that can be rasterized and searched.
///
/// Implementations are not required to be thread-safe; every call is made
/// through [`crate::session::DocumentSession::with_document`], which holds the
/// session's exclusive lock for the duration of the call.
pub trait DocumentModel: Send {
    fn path(&self) -> &Path;
    fn page_count(&self) -> usize;
    /// Natural page size in points.
    fn page_size(&self, page: usize) -> AppResult<SizeF>;
    fn rasterize(&self, page: usize, dpi_x: f32, dpi_y: f32) -> AppResult<RgbaFrame>;
    /// Match rectangles in page-space points, top-left origin, in reading order.
    fn search(&self, page: usize, query: &str, case_insensitive: bool)
    -> AppResult<Vec<PageRect>>;
}

pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> AppResult<Box<dyn DocumentModel>>;
}
