use crate::backend::RgbaFrame;
use crate::geometry::{PixelSize, SizeF};

/// What a cell's bitmap corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellGeneration {
    /// Never rendered in this session.
    Blank,
    /// Bitmap produced for this render epoch.
    Rendered(u64),
    /// Target size changed; the bitmap was dropped.
    Invalidated,
    /// Highlight state changed; the old bitmap stays on screen until refreshed.
    HighlightStale,
    /// Bitmap released to bound memory.
    Evicted,
}

/// Per-page render state, owned and mutated only by the coordinating viewer.
#[derive(Debug, Clone)]
pub struct PageCell {
    index: usize,
    natural_size: SizeF,
    target_size: PixelSize,
    bitmap: Option<RgbaFrame>,
    is_loading: bool,
    generation: CellGeneration,
}

impl PageCell {
    pub fn new(index: usize, natural_size: SizeF) -> Self {
        assert!(
            natural_size.is_valid(),
            "page {index} has a non-positive natural size"
        );
        Self {
            index,
            natural_size,
            target_size: PixelSize::default(),
            bitmap: None,
            is_loading: false,
            generation: CellGeneration::Blank,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn natural_size(&self) -> SizeF {
        self.natural_size
    }

    pub fn target_size(&self) -> PixelSize {
        self.target_size
    }

    pub fn bitmap(&self) -> Option<&RgbaFrame> {
        self.bitmap.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn generation(&self) -> CellGeneration {
        self.generation
    }

    pub fn needs_render(&self, epoch: u64) -> bool {
        self.generation != CellGeneration::Rendered(epoch)
    }

    /// Applies a new target size. Returns whether the size actually changed.
    pub fn resize(&mut self, target_size: PixelSize) -> bool {
        if self.target_size == target_size {
            return false;
        }
        self.target_size = target_size;
        self.bitmap = None;
        self.generation = CellGeneration::Invalidated;
        true
    }

    pub fn mark_highlight_stale(&mut self) {
        if matches!(self.generation, CellGeneration::Rendered(_)) {
            self.generation = CellGeneration::HighlightStale;
        }
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub(crate) fn install(&mut self, bitmap: RgbaFrame, epoch: u64) {
        self.bitmap = Some(bitmap);
        self.is_loading = false;
        self.generation = CellGeneration::Rendered(epoch);
    }

    /// Releases the bitmap unless a render is in flight.
    pub fn evict(&mut self) -> bool {
        if self.is_loading || self.bitmap.is_none() {
            return false;
        }
        self.bitmap = None;
        self.generation = CellGeneration::Evicted;
        true
    }
}
