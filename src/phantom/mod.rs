//! Susceptibility phantom construction
//!
//! - `source`: closed set of source shapes and their membership tests
//! - `rasterize`: additive accumulation of sources onto an anisotropic grid

pub mod rasterize;
pub mod source;

pub use rasterize::*;
pub use source::*;
