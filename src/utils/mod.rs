//! Utility functions for the simulator
//!
//! - Reconstruction quality metrics (RMSE, NRMSE, correlation)
//! - SIMD-accelerated element-wise operations (optional, with `simd` feature)

pub mod metrics;
pub mod simd_ops;

pub use metrics::*;
pub use simd_ops::*;
