//! # types
//!
//! Contains and organizes types used in the lbm module.
//! These types are re-exported through the lbm module.

use std::ops::AddAssign;

/// Point particle as seen by the fluid coupling. Positions are global, velocities and forces in MD units.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Particle {
    /// Unique particle id, shared by all ghost replicas
    pub identity: u64,
    pub pos: [f64; 3],
    pub v: [f64; 3],
    /// Accumulated force
    pub f: [f64; 3],
    /// Random part of the last coupling force
    pub f_random: [f64; 3],
}

impl Particle {
    pub fn new(identity: u64, pos: [f64; 3], v: [f64; 3]) -> Particle {
        Particle { identity, pos, v, ..Default::default() }
    }
}

/// Particles known to one process: the ones it owns and the ghost replicas it holds for neighbours.
#[derive(Clone, Debug, Default)]
pub struct ParticleCells {
    pub local: Vec<Particle>,
    pub ghosts: Vec<Particle>,
}

/// Particle cell system kinds.
///
/// - `DomainDecomposition`: spatial cells aligned with the process grid
/// - `Nsquare`: all-to-all particle distribution
/// - `Layered`: slabs along z
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CellStructureKind {
    #[default]
    DomainDecomposition,
    Nsquare,
    Layered,
}

/// State of the particle cell system the fluid is coupled to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CellStructure {
    pub kind: CellStructureKind,
    pub use_verlet_lists: bool,
}

/// Hydrodynamic fields of one lattice node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeFields {
    pub rho: f64,
    /// Momentum density
    pub j: [f64; 3],
    /// Stress tensor `xx, xy, yy, xz, yz, zz`
    pub pi: [f64; 6],
}

impl NodeFields {
    /// Equilibrium fields of fluid with density `rho` moving with velocity `v`.
    pub fn equilibrium(rho: f64, v: [f64; 3], c_sound_sq: f64) -> NodeFields {
        let j = [rho * v[0], rho * v[1], rho * v[2]];
        let p = rho * c_sound_sq;
        NodeFields {
            rho,
            j,
            pi: [
                p + j[0] * v[0],
                j[0] * v[1],
                p + j[1] * v[1],
                j[0] * v[2],
                j[1] * v[2],
                p + j[2] * v[2],
            ],
        }
    }

    pub fn velocity(&self) -> [f64; 3] {
        [self.j[0] / self.rho, self.j[1] / self.rho, self.j[2] / self.rho]
    }

    /// Non-equilibrium part of the stress, `pi - rho c_s^2 - j j / rho`.
    pub fn pi_neq(&self, c_sound_sq: f64) -> [f64; 6] {
        let eq = NodeFields::equilibrium(self.rho, self.velocity(), c_sound_sq).pi;
        std::array::from_fn(|k| self.pi[k] - eq[k])
    }
}

/// Counters of numerical warnings and consistency problems. Never fatal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LbDiagnostics {
    /// Random numbers drawn for thermalization and coupling
    pub random_draws: u64,
    /// Sites found with a negative population
    pub negative_populations: u64,
    /// Halo values that differ from the neighbour's boundary layer
    pub halo_mismatches: u64,
    /// Coupling steps that changed the fluid mass
    pub coupling_mass_errors: u64,
    /// LB ticks performed
    pub ticks: u64,
}

impl AddAssign for LbDiagnostics {
    fn add_assign(&mut self, rhs: LbDiagnostics) {
        self.random_draws += rhs.random_draws;
        self.negative_populations += rhs.negative_populations;
        self.halo_mismatches += rhs.halo_mismatches;
        self.coupling_mass_errors += rhs.coupling_mass_errors;
        self.ticks = self.ticks.max(rhs.ticks);
    }
}

impl LbDiagnostics {
    /// Counters packed for reductions over processes
    pub fn to_array(&self) -> [u64; 5] {
        [self.random_draws, self.negative_populations, self.halo_mismatches, self.coupling_mass_errors, self.ticks]
    }

    pub fn from_array(a: [u64; 5]) -> LbDiagnostics {
        LbDiagnostics {
            random_draws: a[0],
            negative_populations: a[1],
            halo_mismatches: a[2],
            coupling_mass_errors: a[3],
            ticks: a[4],
        }
    }
}
