//! # coupling
//!
//! Frictional point-particle coupling to the fluid.
//!
//! The force on a particle is `F = -friction * (v - u) + f_random`, `u` being the fluid velocity
//! interpolated trilinearly from the 8 surrounding nodes. The opposite momentum is spread onto the
//! same 8 nodes with the same weights. Ghost replicas near the low faces of a sub-lattice deposit
//! momentum onto the nodes their home process can not reach, so every replica has to use the
//! random numbers drawn by the home process.

use std::collections::HashMap;

use rand::Rng;
use rayon::prelude::*;

use super::collide::has_negative_population;
use super::d3q19::{C, Q};
use super::error::{LbError, LbResult};
use super::lattice::{ElementaryCell, LatticeGeometry};
use super::params::LbContext;
use super::store::DistributionStore;
use super::types::{LbDiagnostics, Particle};

/// `(rho, jx, jy, jz)` of a site in lattice units
pub type FlowField = Vec<[f64; 4]>;

/// Snapshot of density and momentum density at every site of the halo padded volume.
pub fn calc_flow_field(ctx: &LbContext, store: &DistributionStore) -> FlowField {
    let volume = store.volume();
    let current = store.current();
    let avg_rho = ctx.derived.avg_rho;
    (0..volume)
        .into_par_iter()
        .map(|site| {
            let mut field = [avg_rho, 0.0, 0.0, 0.0];
            for i in 0..Q {
                let n = current[i * volume + site];
                field[0] += n;
                field[1] += n * C[i][0] as f64;
                field[2] += n * C[i][1] as f64;
                field[3] += n * C[i][2] as f64;
            }
            field
        })
        .collect()
}

/// Random coupling force, uniform in `[-prefactor / 2, prefactor / 2)` per axis.
pub fn draw_random_force<R: Rng>(ctx: &LbContext, rng: &mut R) -> [f64; 3] {
    let pref = ctx.derived.coupling_prefactor;
    std::array::from_fn(|_| pref * (rng.gen::<f64>() - 0.5))
}

/// Random forces of the locally owned particles, keyed by particle identity.
#[derive(Clone, Debug, Default)]
pub struct RandomForceTable {
    forces: HashMap<u64, [f64; 3]>,
}

impl RandomForceTable {
    pub fn new() -> RandomForceTable {
        RandomForceTable::default()
    }

    pub fn insert(&mut self, identity: u64, f_random: [f64; 3]) {
        self.forces.insert(identity, f_random);
    }

    pub fn extend(&mut self, draws: impl IntoIterator<Item = (u64, [f64; 3])>) {
        self.forces.extend(draws);
    }

    pub fn get(&self, identity: u64) -> Option<&[f64; 3]> {
        self.forces.get(&identity)
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Give every ghost the random force drawn by its home process.
    pub fn apply_to_ghosts(&self, ghosts: &mut [Particle]) -> LbResult<()> {
        for g in ghosts.iter_mut() {
            match self.forces.get(&g.identity) {
                Some(f) => g.f_random = *f,
                None => return Err(LbError::OrphanGhost { identity: g.identity }),
            }
        }
        Ok(())
    }
}

/// Ghosts couple only while they are within one lattice spacing below the local box.
pub fn in_coupling_range(geometry: &LatticeGeometry, pos: &[f64; 3]) -> bool {
    let right = geometry.my_right();
    (0..3).all(|d| pos[d] >= geometry.my_left[d] - geometry.agrid && pos[d] < right[d])
}

/// Trilinearly interpolated fluid velocity in lattice units.
pub fn interpolate_velocity(cell: &ElementaryCell, flowfield: &FlowField) -> [f64; 3] {
    let mut u = [0.0; 3];
    for k in 0..8 {
        let f = &flowfield[cell.nodes[k].0];
        let w = cell.weight(k);
        u[0] += w * f[1] / f[0];
        u[1] += w * f[2] / f[0];
        u[2] += w * f[3] / f[0];
    }
    u
}

/// Friction plus random force on particle `p` in a fluid moving with lattice velocity `u`.
pub fn viscous_force(ctx: &LbContext, p: &Particle, u: &[f64; 3]) -> [f64; 3] {
    let friction = ctx.params.friction;
    std::array::from_fn(|a| -friction * (p.v[a] - ctx.units.speed_to_md(u[a])) + p.f_random[a])
}

/// Spread the momentum `-force * dt` onto the nodes of `cell`.
/// Returns the number of touched nodes left with a negative population.
pub fn transfer_momentum(ctx: &LbContext, cell: &ElementaryCell, store: &mut DistributionStore, force: &[f64; 3]) -> u64 {
    let dj: [f64; 3] = std::array::from_fn(|a| -ctx.units.force_to_momentum(force[a]));
    let mut negative = 0;
    for k in 0..8 {
        let w = cell.weight(k);
        let dn = ctx.model.momentum_increment(&[w * dj[0], w * dj[1], w * dj[2]]);
        store.add_node(cell.nodes[k], &dn);
        if has_negative_population(ctx.derived.avg_rho, &store.node(cell.nodes[k])) {
            negative += 1;
        }
    }
    negative
}

fn cell_mass(store: &DistributionStore, cell: &ElementaryCell) -> f64 {
    cell.nodes.iter().map(|n| store.node(*n).iter().sum::<f64>()).sum()
}

/// Couple one particle (local or ghost) to the fluid and return the force acting on it.
///
/// With `check_mass` the deposit is verified to leave the mass of the 8 nodes unchanged.
pub fn couple_particle(
    ctx: &LbContext,
    geometry: &LatticeGeometry,
    flowfield: &FlowField,
    store: &mut DistributionStore,
    p: &Particle,
    check_mass: bool,
    diagnostics: &mut LbDiagnostics,
) -> LbResult<[f64; 3]> {
    let cell = geometry.map_position_to_lattice(&p.pos)?;
    let u = interpolate_velocity(&cell, flowfield);
    let force = viscous_force(ctx, p, &u);

    let before = if check_mass { cell_mass(store, &cell) } else { 0.0 };
    diagnostics.negative_populations += transfer_momentum(ctx, &cell, store, &force);
    if check_mass {
        let after = cell_mass(store, &cell);
        if (after - before).abs() > 1.0e-12 * before.abs().max(1.0) {
            diagnostics.coupling_mass_errors += 1;
            log::error!("Particle {} changed the fluid mass from {} to {}", p.identity, before, after);
        }
    }
    Ok(force)
}
