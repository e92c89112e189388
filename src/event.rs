use crate::geometry::PageRect;

/// Notifications produced by the viewer for the embedding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    DocumentOpened {
        page_count: usize,
    },
    DocumentClosed,
    /// 1-based number of the page currently in view.
    PageInViewChanged(usize),
    /// Ctrl+wheel; the embedder decides whether to step the zoom.
    ZoomRequested {
        zoom_in: bool,
    },
    PageFound {
        page: usize,
        query: String,
        rect: PageRect,
    },
    SearchEmpty {
        query: String,
    },
    SearchReset,
    /// A cell's bitmap changed and should be repainted.
    CellUpdated(usize),
}
