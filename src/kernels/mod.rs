//! Kernel functions for the simulator
//!
//! - Dipole kernel for the susceptibility-to-field relationship, in 3D and
//!   as a planar 2D approximation for a fixed slice orientation

pub mod dipole;

pub use dipole::*;
