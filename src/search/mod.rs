pub mod cancel;
pub mod coordinator;
pub mod engine;

pub use cancel::CancelToken;
pub use coordinator::{SearchCoordinator, SearchSession, SearchStatus};
pub use engine::{SearchEngine, SearchEvent, SearchMatch};
