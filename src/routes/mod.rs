//! Router assembly.

pub mod action;
pub mod common;
pub use action::*;
pub use common::*;
