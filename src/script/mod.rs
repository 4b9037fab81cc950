//! Per-route action scripts and the engine that runs them against a request's variable bag.

mod engine;
mod parser;

pub use engine::*;
pub use parser::*;
