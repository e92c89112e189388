pub mod cell;
pub mod highlight;
pub(crate) mod image_ops;
pub mod rasterizer;
pub mod scheduler;

pub use cell::{CellGeneration, PageCell};
pub use highlight::composite_highlights;
pub use rasterizer::RasterPolicy;
pub use scheduler::{RenderOutcome, RenderScheduler, RenderTask};
