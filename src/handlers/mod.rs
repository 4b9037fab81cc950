//! HTTP handlers: the front controller that feeds requests to the action engine.

pub mod dispatch;
pub use dispatch::*;
