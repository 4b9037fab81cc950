//! SQL templates with `${path}` placeholders, value binding and the executor seam.

mod executor;
pub mod params;
mod template;
pub use executor::*;
pub use params::*;
pub use template::*;
