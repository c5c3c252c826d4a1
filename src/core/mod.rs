// LogSift - core/mod.rs
//
// Core pipeline logic: event model, dispatch, dataset, filters.
// Must NOT depend on: app, platform, or any file I/O.

pub mod context;
pub mod diagnostics;
pub mod filter;
pub mod model;
pub mod sink;
pub mod store;
pub mod thread_filter;
