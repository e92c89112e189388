pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod library;
pub mod logging;
pub mod perf;
pub mod render;
pub(crate) mod runtime;
pub mod search;
pub mod session;
pub mod settings;
pub mod viewer;
pub mod viewport;

#[cfg(test)]
mod testing;
