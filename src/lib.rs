//! # lbsolver
//!
//! Fluctuating D3Q19 lattice Boltzmann fluid on a decomposed lattice, coupled to point particles.
//!
//! - `lbm`: the solver
//! - `file`: configuration reading and writing
//! - `setup`: demo scenario used by the binary
//! - `debug`: fluid summaries

pub mod debug;
pub mod file;
pub mod lbm;
pub mod setup;

pub use lbm::{Lbm, LbmConfig};
