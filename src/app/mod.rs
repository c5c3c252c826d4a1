// LogSift - app/mod.rs
//
// Application layer: producers, worker supervision, pipeline wiring.
// Dependencies: core layer.
// Must NOT depend on: platform specifics.

pub mod batch;
pub mod fault;
pub mod pipeline;
pub mod tail;
