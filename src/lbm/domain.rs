//! # domain
//!
//! Defines the `LbmDomain` struct that holds all information to run the fluid on one sub-lattice.
//!
//! `LbmDomain` should not be initialized on it's own, but automatically through the `Lbm::new()` function when initializing a new [`Lbm`],
//! or through the node runner in multi-node mode. This ensures all arguments are correctly set.
//!
//! [`Lbm`]: crate::lbm::Lbm

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::lbm::*;

/// The `LbmDomain` struct holds the state of one sub-lattice: geometry, populations, halo plan,
/// transfer buffers and the random number stream of its process.
pub struct LbmDomain {
    pub rank: usize, // Domain index in the process grid
    pub coords: [usize; 3],

    pub geometry: LatticeGeometry,
    pub store: DistributionStore,
    pub plan: HaloPlan,
    pub transfer: TransferBuffers,
    pub boundary: Option<Boundary>,

    flowfield: FlowField, // Coupling snapshot, valid during one coupling step
    rng: StdRng,
    pub diagnostics: LbDiagnostics,
    pub t: u64, // Timestep
}

impl LbmDomain {
    /// Returns new `LbmDomain` from provided arguments with the fluid at rest at the reference density.
    ///
    /// `LbmDomain` should not be initialized on it's own, but automatically through the `Lbm::new()` function.
    /// This ensures all arguments are correctly set.
    #[rustfmt::skip]
    pub fn new(lbm_config: &LbmConfig, ctx: &LbContext, topology: &ProcessGrid, rank: usize) -> LbmDomain {
        let coords = topology.coordinates(rank);
        let grid = [
            (lbm_config.n_x / lbm_config.d_x) as usize, // Sub-lattice size, halo is added by the geometry
            (lbm_config.n_y / lbm_config.d_y) as usize,
            (lbm_config.n_z / lbm_config.d_z) as usize,
        ];
        let agrid = ctx.params.agrid;
        let my_left = [
            coords[0] as f64 * grid[0] as f64 * agrid,
            coords[1] as f64 * grid[1] as f64 * agrid,
            coords[2] as f64 * grid[2] as f64 * agrid,
        ];
        let geometry = LatticeGeometry::new(grid, agrid, my_left);
        let plan = HaloPlan::build(&geometry, topology, rank);
        let transfer = TransferBuffers::new(&plan);
        log::debug!("Domain {} at {:?}: {:?} nodes, origin {:?}", rank, coords, grid, my_left);

        LbmDomain {
            rank,
            coords,
            store: DistributionStore::new(geometry.halo_grid_volume),
            geometry,
            plan,
            transfer,
            boundary: None,
            flowfield: Vec::new(),
            rng: StdRng::seed_from_u64(lbm_config.seed.wrapping_add(rank as u64)),
            diagnostics: LbDiagnostics::default(),
            t: 0,
        }
    }

    /// Reset the fluid to rest at the reference density. Populations store deviations from it, so this zeroes the store.
    pub fn reinit_fluid(&mut self) {
        self.store.reset();
    }

    // Transfer fields
    /// Extract the boundary layers of `axis` into the transfer buffers
    pub fn transfer_extract_fi(&mut self, axis: Axis) {
        halo::extract(&self.plan, axis, &self.store, &mut self.transfer);
    }

    /// Insert the transfer buffers into the halo of `axis`
    pub fn transfer_insert_fi(&mut self, axis: Axis) {
        halo::insert(&self.plan, axis, &mut self.store, &self.transfer);
    }

    /// Hand the freshly exchanged halo to the boundary collaborator.
    pub fn apply_boundaries(&mut self) {
        if let Some(boundary) = self.boundary.as_mut() {
            boundary.apply(&self.geometry, &mut self.store);
        }
    }

    /// Stream and collide all interior sites, then swap buffers. The halo has to be exchanged beforehand.
    pub fn stream_collide(&mut self, ctx: &LbContext) {
        let before = self.diagnostics.negative_populations;
        let mask = self.boundary.as_ref().map(|b| b.mask.as_slice());
        collide::sweep(ctx, &self.geometry, &mut self.store, mask, &mut self.rng, &mut self.diagnostics);
        self.store.swap();
        self.diagnostics.ticks += 1;
        self.t += 1;
        let negative = self.diagnostics.negative_populations - before;
        if negative > 0 {
            log::warn!("Domain {}: {} sites with negative populations in step {}", self.rank, negative, self.t);
        }
    }

    // Particle coupling
    /// Take the density and momentum snapshot used for interpolation. The halo has to be exchanged beforehand.
    pub fn calc_flow_field(&mut self, ctx: &LbContext) {
        self.flowfield = coupling::calc_flow_field(ctx, &self.store);
    }

    /// Draw the random coupling forces of the local particles and return them keyed by identity.
    pub fn draw_random_forces(&mut self, ctx: &LbContext, particles: &mut [Particle]) -> Vec<(u64, [f64; 3])> {
        let mut draws = Vec::with_capacity(particles.len());
        for p in particles.iter_mut() {
            p.f_random = coupling::draw_random_force(ctx, &mut self.rng);
            draws.push((p.identity, p.f_random));
        }
        self.diagnostics.random_draws += 3 * particles.len() as u64;
        draws
    }

    /// Couple local particles and in-range ghosts to the fluid. Ghosts have to carry their home
    /// process' random forces and `calc_flow_field` has to be called first.
    pub fn couple_particles(&mut self, ctx: &LbContext, cells: &mut ParticleCells, check_mass: bool) -> LbResult<()> {
        for p in cells.local.iter_mut() {
            let force = coupling::couple_particle(ctx, &self.geometry, &self.flowfield, &mut self.store, p, check_mass, &mut self.diagnostics)?;
            for a in 0..3 {
                p.f[a] += force[a];
            }
        }
        // ghosts only deposit momentum, the force is accounted for at home
        for g in cells.ghosts.iter() {
            if coupling::in_coupling_range(&self.geometry, &g.pos) {
                coupling::couple_particle(ctx, &self.geometry, &self.flowfield, &mut self.store, g, check_mass, &mut self.diagnostics)?;
            }
        }
        Ok(())
    }

    // Node access
    /// Local linear index of interior node `local` (0 based, halo excluded)
    pub fn node_index(&self, local: [usize; 3]) -> LbResult<LinearIndex> {
        let g = self.geometry.grid;
        if local[0] >= g[0] || local[1] >= g[1] || local[2] >= g[2] {
            return Err(LbError::NodeOutOfRange { coords: local, grid: g });
        }
        Ok(self.geometry.index(local[0] + 1, local[1] + 1, local[2] + 1))
    }

    /// Hydrodynamic fields of a node in lattice units
    pub fn local_fields(&self, ctx: &LbContext, index: LinearIndex) -> NodeFields {
        let (rho, j, pi) = ctx.model.moments(ctx.derived.avg_rho, &self.store.node(index));
        NodeFields { rho, j, pi }
    }

    /// Set a node to the equilibrium populations of `fields` (lattice units)
    pub fn set_local_fields(&mut self, ctx: &LbContext, index: LinearIndex, fields: &NodeFields) {
        let n = ctx.model.equilibrium(ctx.derived.avg_rho, fields.rho, &fields.j, &fields.pi);
        self.store.set_node(index, &n);
    }

    /// Total fluid mass and momentum of the interior in lattice units
    pub fn local_totals(&self, ctx: &LbContext) -> (f64, [f64; 3]) {
        let indices: Vec<LinearIndex> = self.geometry.interior().collect();
        let (model, avg_rho, store) = (ctx.model, ctx.derived.avg_rho, &self.store);
        indices
            .par_iter()
            .map(|i| {
                let (rho, j, _) = model.moments(avg_rho, &store.node(*i));
                (rho, j)
            })
            .reduce(|| (0.0, [0.0; 3]), |a, b| (a.0 + b.0, [a.1[0] + b.1[0], a.1[1] + b.1[1], a.1[2] + b.1[2]]))
    }

    /// Debug function. Logs all populations and fields of a cell in lattice and MD units.
    #[allow(unused)]
    pub fn dump_cell(&self, ctx: &LbContext, index: LinearIndex) {
        let (x, y, z) = self.geometry.coordinates(index);
        let f = self.local_fields(ctx, index);
        let v = f.velocity();
        log::info!(
            "Cell {} ({}, {}, {}) of domain {}:\n    populations: {:?}\n    rho: {} ({} MD)\n    u: {:?} ({:?} MD)\n    pi: {:?}",
            index.0, x, y, z, self.rank,
            self.store.node(index),
            f.rho, ctx.units.dens_to_md(f.rho),
            v, v.map(|u| ctx.units.speed_to_md(u)),
            f.pi
        );
    }
}
