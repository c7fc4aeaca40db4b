//! # boundary
//!
//! Hook for boundary conditions. Boundary geometry is defined elsewhere; the fluid only needs a
//! precomputed per-site mask and a collaborator that updates the flagged sites after each halo
//! exchange. Flagged sites are skipped by the collision sweep.

use super::lattice::LatticeGeometry;
use super::store::DistributionStore;

pub trait BoundaryConditions: Send + Sync {
    /// Update the populations of the sites flagged in `mask`. Called once per LB tick, after the
    /// halo exchange and before the collision sweep.
    fn apply(&mut self, geometry: &LatticeGeometry, mask: &[bool], store: &mut DistributionStore);
}

/// Boundary mask over the halo padded volume plus the collaborator handling it.
pub struct Boundary {
    pub mask: Vec<bool>,
    pub conditions: Box<dyn BoundaryConditions>,
}

impl Boundary {
    pub fn new(mask: Vec<bool>, conditions: Box<dyn BoundaryConditions>) -> Boundary {
        Boundary { mask, conditions }
    }

    pub fn apply(&mut self, geometry: &LatticeGeometry, store: &mut DistributionStore) {
        self.conditions.apply(geometry, &self.mask, store);
    }
}
