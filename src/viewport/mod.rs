pub mod layout;
pub mod state;
pub mod window;

pub use layout::{DocumentLayout, LayoutMetrics, Relayout, ScrollAnchor, ZoomLayoutEngine};
pub use state::ViewportState;
pub use window::{ViewportWindowManager, WindowPolicy, Zone, page_in_view};
