//! # error
//!
//! Error type of the lbm module.
//!
//! Configuration and precondition failures are returned as [`LbError`]. Numerical warnings and
//! communication consistency problems are never errors, they are counted in
//! [`LbDiagnostics`](crate::lbm::LbDiagnostics).

use thiserror::Error;

/// Result type of the lbm module
pub type LbResult<T> = Result<T, LbError>;

#[derive(Error, Debug)]
pub enum LbError {
    /// A physical parameter outside its admissible range
    #[error("invalid {name} = {value}: {requirement}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("LB time step tau = {tau} must not be smaller than the MD time step {time_step}")]
    TimeStepTooLarge { tau: f64, time_step: f64 },

    #[error("external force {force:?} requires the ext_volume_force extension")]
    ExternalForceDisabled { force: [f64; 3] },

    /// Sanity check 103
    #[error("LB requires the domain-decomposition cellsystem")]
    NotDomainDecomposition,

    /// Sanity check 104
    #[error("LB requires no Verlet lists")]
    VerletListsEnabled,

    #[error("invalid lattice: {n:?} nodes on a {d:?} process grid")]
    InvalidLattice { n: [u32; 3], d: [u32; 3] },

    #[error("domain number and node mismatch: {domains} domains and {nodes} nodes")]
    DomainMismatch { domains: usize, nodes: usize },

    #[error("no domain {domain}, the lattice has {domains} domains")]
    NoSuchDomain { domain: usize, domains: usize },

    #[error("boundary mask covers {len} sites, the sub-lattice has {volume}")]
    BoundaryMaskSize { len: usize, volume: usize },

    #[error("lattice node {coords:?} outside of the {grid:?} lattice")]
    NodeOutOfRange { coords: [usize; 3], grid: [usize; 3] },

    #[error("position {pos:?} is not covered by the local lattice")]
    PositionOutsideLattice { pos: [f64; 3] },

    /// Ghost particle whose home process did not provide random numbers
    #[error("ghost particle {identity} has no owner on any process")]
    OrphanGhost { identity: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}
