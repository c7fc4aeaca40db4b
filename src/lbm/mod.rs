//! # lbm
//!
//! Contains methods for creating and running fluctuating Lattice-Boltzmann fluids coupled to point particles
//!
//! Structured into:
//! - `lbm`: LBM configuration struct, LBM simulation master struct, node interface
//! - `mod domain`: `LbmDomain` struct holding one sub-lattice
//! - `mod d3q19`: the D3Q19 velocity set and its moment basis
//! - `mod lattice`: sub-lattice geometry and process grid
//! - `mod params`: physical parameters, derived lattice parameters and the `LbContext`
//! - `mod store`: double buffered population storage
//! - `mod halo`: halo exchange plan and execution
//! - `mod collide`: moment space collision and the collision sweep
//! - `mod scheduler`: LB tick scheduling inside the MD loop
//! - `mod coupling`: particle-fluid momentum exchange
//! - `mod boundary`: boundary condition hook
//! - `mod multi-node`: Extensions for simulation execution on multiple compute nodes (optional)
//! - `mod units`: Units struct for unit conversion between MD and lattice units
//!
//! This is the core funtionality of the solver.

pub mod boundary;
pub mod collide;
pub mod coupling;
pub mod d3q19;
mod domain;
mod error;
pub mod halo;
pub mod lattice;
#[cfg(feature = "multi-node")]
pub mod multi_node;
pub mod params;
pub mod scheduler;
pub mod store;
mod types;
mod units;

pub use boundary::{Boundary, BoundaryConditions};
pub use coupling::{FlowField, RandomForceTable};
pub use d3q19::{D3q19, C_SOUND_SQ};
pub use domain::LbmDomain;
pub use error::{LbError, LbResult};
pub use halo::{HaloPlan, HaloTransport, TransferBuffers};
pub use lattice::{Axis, LatticeGeometry, LinearIndex, ProcessGrid};
pub use params::{ChangeScope, DerivedParameters, LbContext, ParameterChange, PhysicalParameters};
pub use scheduler::UpdateScheduler;
pub use store::DistributionStore;
pub use types::*;
pub use units::Units;

/// Struct used to bundle arguments for LBM simulation setup.
///
/// Use this struct to configure a simulation and then instantiate the simulation with `Lbm::new(LbmConfig)`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LbmConfig {
    /// Fluid parameters in MD units
    pub params: PhysicalParameters,
    /// MD time step
    pub time_step: f64,
    /// Number of lattice nodes on each axis
    pub n_x: u32,
    pub n_y: u32,
    pub n_z: u32,

    /// Number of domains on each axis
    pub d_x: u32,
    pub d_y: u32,
    pub d_z: u32,

    /// Particle cell system the fluid is coupled to
    pub cell_structure: CellStructure,

    //Extensions
    /// Enable volume force extension. Needed for `params.ext_force`
    pub ext_volume_force: bool,
    /// Couple particles to the fluid
    pub momentum_exchange: bool,
    /// Verify halo exchanges and coupling mass conservation (slow)
    pub halo_checks: bool,

    /// Seed of the random number streams, offset by the domain index
    pub seed: u64,
    /// Run the simulation for x steps
    pub run_steps: u64,
}

impl LbmConfig {
    /// Returns `LbmConfig` with default values
    pub fn new() -> LbmConfig {
        LbmConfig {
            params: PhysicalParameters::default(),
            time_step: 1.0,
            n_x: 1,
            n_y: 1,
            n_z: 1,
            d_x: 1,
            d_y: 1,
            d_z: 1,
            cell_structure: CellStructure::default(),

            ext_volume_force: false,
            momentum_exchange: true,
            halo_checks: cfg!(debug_assertions),

            seed: 0,
            run_steps: 0,
        }
    }

    /// Process grid of the configured domains
    pub fn topology(&self) -> ProcessGrid {
        ProcessGrid::new(self.d_x as usize, self.d_y as usize, self.d_z as usize)
    }

    /// Box length on each axis in MD units
    pub fn box_l(&self) -> [f64; 3] {
        let a = self.params.agrid;
        [self.n_x as f64 * a, self.n_y as f64 * a, self.n_z as f64 * a]
    }

    /// Checks the lattice against the domain numbers. Resolutions not divisible by the domain numbers are rounded down.
    pub fn validate_resolution(&mut self) -> LbResult<()> {
        let n = [self.n_x, self.n_y, self.n_z];
        let d = [self.d_x, self.d_y, self.d_z];
        if (0..3).any(|a| d[a] == 0 || n[a] < d[a]) {
            return Err(LbError::InvalidLattice { n, d });
        }
        let n_d_x: u32 = (self.n_x / self.d_x) * self.d_x;
        let n_d_y: u32 = (self.n_y / self.d_y) * self.d_y;
        let n_d_z: u32 = (self.n_z / self.d_z) * self.d_z;
        if n_d_x != self.n_x || n_d_y != self.n_y || n_d_z != self.n_z {
            log::warn!(
                "Resolution {}, {}, {} not divisible by Domains: Overiding resolution.",
                self.n_x, self.n_y, self.n_z
            );
        }
        self.n_x = n_d_x;
        self.n_y = n_d_y;
        self.n_z = n_d_z;
        Ok(())
    }
}

impl Default for LbmConfig {
    fn default() -> Self {
        LbmConfig::new()
    }
}

/// LB only works with spatially decomposed particles and without Verlet lists.
pub fn check_cell_structure(cells: &CellStructure) -> LbResult<()> {
    if cells.kind != CellStructureKind::DomainDecomposition {
        return Err(LbError::NotDomainDecomposition);
    }
    if cells.use_verlet_lists {
        return Err(LbError::VerletListsEnabled);
    }
    Ok(())
}

/// To start a LBM simulation, initialise an Lbm struct:
/// ```ignore
/// Lbm::new(lbm_config: LbmConfig)
/// ```
/// The `new()` function takes in another struct, the [`LbmConfig`], which contains all necessary arguments.
/// [`LbmConfig`] needs to be configured beforehand.
///
/// The Lbm struct contains one or multiple [`LbmDomain`] structs, each holding one sub-lattice of the
/// process grid. All domains live in this process and exchange their halos by swapping transfer buffers.
/// For execution on multiple compute nodes see `multi_node`.
///
/// [`LbmConfig`]: crate::lbm::LbmConfig
/// [`LbmDomain`]: crate::lbm::LbmDomain
pub struct Lbm {
    /// Vector of [`LbmDomain`]s that are part of this simulation.
    pub domains: Vec<LbmDomain>,
    /// A copy of the [`LbmConfig`] used to initialize the simulation, kept in step with parameter changes.
    config: LbmConfig,
    /// Fluid parameters shared by all domains
    ctx: LbContext,
    pub topology: ProcessGrid,
    scheduler: UpdateScheduler,
    initialized: bool,
}

impl Lbm {
    /// Returns new `Lbm` struct from pre-configured `LbmConfig` struct. `LbmDomain` setup is handled automatically.
    /// Nothing is allocated if the configuration or the particle cell system are unsuitable.
    pub fn new(mut lbm_config: LbmConfig) -> LbResult<Lbm> {
        check_cell_structure(&lbm_config.cell_structure)?;
        lbm_config.validate_resolution()?;
        let ctx = LbContext::new(lbm_config.params, lbm_config.time_step, lbm_config.ext_volume_force)?;
        let topology = lbm_config.topology();

        let domains = build_domains(&lbm_config, &ctx, &topology);
        log::info!("All domains initialized.");
        ctx.units.print();

        Ok(Lbm {
            domains,
            config: lbm_config,
            ctx,
            topology,
            scheduler: UpdateScheduler::new(),
            initialized: false,
        })
    }

    /// Readies the LBM Simulation to be run.
    /// Resets the fluid to rest at the reference density and fills the halos.
    pub fn initialize(&mut self) {
        for d in 0..self.get_d_n() {
            self.domains[d].reinit_fluid();
        }
        self.communicate_fi();
        self.scheduler.reset();
        self.reset_timestep();
        self.initialized = true;
    }

    /// Runs Simulations for `steps` LB ticks
    pub fn run(&mut self, steps: u64) {
        //Initialize, then run simulation for steps
        if !self.initialized {
            self.initialize();
        }
        for _ in 0..steps {
            self.do_time_step();
        }
    }

    /// Accumulate one MD step of length `dt_md` and run an LB tick once `tau` has been reached.
    /// Returns `true` if the fluid advanced.
    pub fn advance(&mut self, dt_md: f64) -> bool {
        if !self.initialized {
            self.initialize();
        }
        if self.scheduler.advance(dt_md, self.ctx.params.tau) {
            self.do_time_step();
            true
        } else {
            false
        }
    }

    /// Executes one LBM time step: halo exchange, boundaries, collision sweep and buffer swap on every domain.
    pub fn do_time_step(&mut self) {
        self.communicate_fi();
        if self.config.halo_checks {
            self.check_halo_regions();
        }
        for d in 0..self.get_d_n() {
            self.domains[d].apply_boundaries();
        }
        for d in 0..self.get_d_n() {
            self.domains[d].stream_collide(&self.ctx);
        }
    }

    /// Couple particles to the fluid for one MD step. `cells[d]` holds the particles of domain `d`.
    /// Forces are added to the local particles.
    pub fn couple_particles(&mut self, cells: &mut [ParticleCells]) -> LbResult<()> {
        if !self.config.momentum_exchange {
            return Ok(());
        }
        if cells.len() != self.get_d_n() {
            return Err(LbError::DomainMismatch { domains: self.get_d_n(), nodes: cells.len() });
        }
        self.communicate_fi();
        if self.config.halo_checks {
            self.check_halo_regions();
        }
        for d in 0..self.get_d_n() {
            self.domains[d].calc_flow_field(&self.ctx);
        }

        // home processes draw, every replica uses the same numbers
        let mut table = RandomForceTable::new();
        for d in 0..self.get_d_n() {
            table.extend(self.domains[d].draw_random_forces(&self.ctx, &mut cells[d].local));
        }
        for cell in cells.iter_mut() {
            table.apply_to_ghosts(&mut cell.ghosts)?;
        }

        for d in 0..self.get_d_n() {
            self.domains[d].couple_particles(&self.ctx, &mut cells[d], self.config.halo_checks)?;
        }
        Ok(())
    }

    /// Sort particles into the domains owning them and create the periodic ghost images every domain needs
    /// for coupling. Positions of local particles are folded into the box.
    pub fn decompose_particles(&self, particles: &[Particle]) -> Vec<ParticleCells> {
        let box_l = self.config.box_l();
        (0..self.get_d_n())
            .map(|d| domain_particles(particles, box_l, &self.topology, d, &self.domains[d].geometry))
            .collect()
    }

    /// Apply a parameter change. Dependent lattice quantities are re-derived and, depending on the
    /// parameter, the fluid or the whole lattice are reinitialised. Nothing changes on error.
    pub fn set_parameter(&mut self, change: ParameterChange) -> LbResult<()> {
        let mut new_config = self.config.clone();
        if let ParameterChange::Agrid(agrid) = change {
            // keep the box, the node numbers follow the new spacing
            let box_l = self.config.box_l();
            let n: Vec<u32> = box_l.iter().map(|l| (l / agrid).round() as u32).collect();
            for a in 0..3 {
                if ((n[a] as f64) * agrid - box_l[a]).abs() > 1.0e-10 * box_l[a] {
                    return Err(LbError::InvalidParameter {
                        name: "agrid",
                        value: agrid,
                        requirement: "box length must be a multiple of agrid",
                    });
                }
            }
            (new_config.n_x, new_config.n_y, new_config.n_z) = (n[0], n[1], n[2]);
            new_config.validate_resolution()?;
        }

        let mut ctx = self.ctx.clone();
        let scope = ctx.apply(change)?;
        new_config.params = ctx.params;
        self.ctx = ctx;
        self.config = new_config;

        match scope {
            ChangeScope::Geometry => {
                self.domains = build_domains(&self.config, &self.ctx, &self.topology);
                self.initialize();
            }
            ChangeScope::Fluid => self.initialize(),
            ChangeScope::Parameters => {}
        }
        log::info!("Parameter change {:?} applied ({:?})", change, scope);
        Ok(())
    }

    /// Attach boundary conditions to domain `d`. The mask has to cover the halo padded sub-lattice of the domain.
    pub fn set_boundary(&mut self, d: usize, boundary: Boundary) -> LbResult<()> {
        let domains = self.get_d_n();
        let Some(domain) = self.domains.get_mut(d) else {
            return Err(LbError::NoSuchDomain { domain: d, domains });
        };
        let volume = domain.geometry.halo_grid_volume;
        if boundary.mask.len() != volume {
            return Err(LbError::BoundaryMaskSize { len: boundary.mask.len(), volume });
        }
        domain.boundary = Some(boundary);
        Ok(())
    }

    /// Configuration the lattice was built from. Changes go through [`Lbm::set_parameter`].
    pub fn config(&self) -> &LbmConfig {
        &self.config
    }

    /// Fluid parameters and derived lattice quantities
    pub fn ctx(&self) -> &LbContext {
        &self.ctx
    }

    // Node interface
    /// Domain index and local linear index of global lattice node `coords`.
    fn locate_node(&self, coords: [usize; 3]) -> LbResult<(usize, LinearIndex)> {
        let n = [self.config.n_x as usize, self.config.n_y as usize, self.config.n_z as usize];
        if (0..3).any(|a| coords[a] >= n[a]) {
            return Err(LbError::NodeOutOfRange { coords, grid: n });
        }
        let grid = self.domains[0].geometry.grid;
        let d = self.topology.rank([coords[0] / grid[0], coords[1] / grid[1], coords[2] / grid[2]]);
        let index = self.domains[d].node_index([coords[0] % grid[0], coords[1] % grid[1], coords[2] % grid[2]])?;
        Ok((d, index))
    }

    /// Density, momentum density and stress of global lattice node `coords` in MD units.
    /// Density scales by `agrid^3`, momentum density by `tau / agrid`.
    pub fn get_node(&self, coords: [usize; 3]) -> LbResult<NodeFields> {
        let (d, index) = self.locate_node(coords)?;
        let f = self.domains[d].local_fields(&self.ctx, index);
        let u = &self.ctx.units;
        Ok(NodeFields {
            rho: u.dens_to_md(f.rho),
            j: f.j.map(|j| u.momentum_density_to_md(j)),
            pi: f.pi.map(|p| u.stress_to_md(p)),
        })
    }

    /// Non-equilibrium stress of global lattice node `coords` in MD units.
    pub fn get_node_pi_neq(&self, coords: [usize; 3]) -> LbResult<[f64; 6]> {
        let (d, index) = self.locate_node(coords)?;
        let f = self.domains[d].local_fields(&self.ctx, index);
        Ok(f.pi_neq(C_SOUND_SQ).map(|p| self.ctx.units.stress_to_md(p)))
    }

    /// Set global lattice node `coords` to the equilibrium with the given fields (MD units).
    pub fn set_node(&mut self, coords: [usize; 3], fields: &NodeFields) -> LbResult<()> {
        let (d, index) = self.locate_node(coords)?;
        let u = self.ctx.units;
        let lattice = NodeFields {
            rho: u.md_to_dens(fields.rho),
            j: fields.j.map(|j| u.md_to_momentum_density(j)),
            pi: fields.pi.map(|p| u.md_to_stress(p)),
        };
        self.domains[d].set_local_fields(&self.ctx, index, &lattice);
        Ok(())
    }

    /// Set global lattice node `coords` to density `rho` moving with velocity `v` (MD units).
    pub fn set_node_velocity(&mut self, coords: [usize; 3], rho: f64, v: [f64; 3]) -> LbResult<()> {
        let (d, index) = self.locate_node(coords)?;
        let u = self.ctx.units;
        let lattice = NodeFields::equilibrium(u.md_to_dens(rho), v.map(|v| u.md_to_speed(v)), C_SOUND_SQ);
        self.domains[d].set_local_fields(&self.ctx, index, &lattice);
        Ok(())
    }

    /// Total fluid mass in MD units
    pub fn total_mass(&self) -> f64 {
        self.domains.iter().map(|d| d.local_totals(&self.ctx).0).sum()
    }

    /// Total fluid momentum in MD units
    pub fn total_momentum(&self) -> [f64; 3] {
        let mut j = [0.0; 3];
        for d in &self.domains {
            let (_, jd) = d.local_totals(&self.ctx);
            for a in 0..3 {
                j[a] += self.ctx.units.speed_to_md(jd[a]);
            }
        }
        j
    }

    /// Average fluid density in MD units
    pub fn average_density(&self) -> f64 {
        let nodes = self.config.n_x as f64 * self.config.n_y as f64 * self.config.n_z as f64;
        self.ctx.units.dens_to_md(self.total_mass() / nodes)
    }

    /// Counters summed over all domains
    pub fn diagnostics(&self) -> LbDiagnostics {
        let mut total = LbDiagnostics::default();
        for d in &self.domains {
            total += d.diagnostics;
        }
        total
    }

    // Domain communication
    /// Communicate Fi across domain boundaries. Axes are handled one after another, a domain that is its own
    /// neighbour swaps its own transfer buffers.
    #[rustfmt::skip]
    fn communicate_fi(&mut self) {
        let d_n = self.get_d_n();
        for axis in Axis::ALL {
            for d in 0..d_n {self.domains[d].transfer_extract_fi(axis);} // Extract into transfer buffers
            for d in 0..d_n { // Swap transfer buffers at domain boundaries
                let dp = self.topology.neighbor(d, axis, 1); // domain index of domain at +1
                swap_transfer_buffers(&mut self.domains, d, dp);
            }
            for d in 0..d_n {self.domains[d].transfer_insert_fi(axis);} // Insert from transfer buffers
        }
    }

    /// Compare every halo plane with the boundary layer of the neighbour it mirrors.
    /// Mismatches are logged and counted, returns their number.
    pub fn check_halo_regions(&mut self) -> u64 {
        use halo::Direction::{Minus, Plus};
        let mut total = 0;
        for axis in Axis::ALL {
            for d in 0..self.get_d_n() {
                let mut mismatches = 0;
                for (direction, step) in [(Plus, -1), (Minus, 1)] {
                    let neighbor = &self.domains[self.topology.neighbor(d, axis, step)];
                    let mut expected = vec![0.0; neighbor.plan.message_len(axis)];
                    halo::pack(&neighbor.plan.transfer(axis, direction).send, &neighbor.store, &mut expected);
                    let own = &self.domains[d];
                    mismatches += halo::count_mismatches(&own.plan.transfer(axis, direction).recv, &own.store, &expected) as u64;
                }
                if mismatches > 0 {
                    log::error!("Halo check failed: {} mismatches on axis {:?} of domain {}", mismatches, axis, d);
                    self.domains[d].diagnostics.halo_mismatches += mismatches;
                }
                total += mismatches;
            }
        }
        total
    }

    // Helper functions
    /// Resets timestep variable for every `LbmDomain`
    fn reset_timestep(&mut self) {
        for d in 0..self.domains.len() {
            self.domains[d].t = 0;
        }
    }

    /// Returns the amount of domains for this lbm
    pub fn get_d_n(&self) -> usize {
        self.domains.len()
    }

    /// Returns the current simulation timestep
    pub fn get_time_step(&self) -> u64 {
        self.domains[0].t
    }
}

/// Particles of domain `rank`: the ones it owns, folded into the box, and the periodic images of all
/// particles that fall into its coupling range.
pub fn domain_particles(particles: &[Particle], box_l: [f64; 3], topology: &ProcessGrid, rank: usize, geometry: &LatticeGeometry) -> ParticleCells {
    let mut cells = ParticleCells::default();
    for p in particles {
        let mut home = *p;
        let mut coords = [0usize; 3];
        for a in 0..3 {
            home.pos[a] = p.pos[a].rem_euclid(box_l[a]);
            if home.pos[a] >= box_l[a] {
                home.pos[a] = 0.0; // round-off of tiny negative positions
            }
            let local_l = box_l[a] / topology.dims[a] as f64;
            coords[a] = ((home.pos[a] / local_l).floor() as usize).min(topology.dims[a] - 1);
        }
        let owner = topology.rank(coords);
        if owner == rank {
            cells.local.push(home);
        }

        for s in 0..27 {
            let shift = [(s % 3) as f64 - 1.0, ((s / 3) % 3) as f64 - 1.0, (s / 9) as f64 - 1.0];
            if owner == rank && shift == [0.0; 3] {
                continue;
            }
            let mut ghost = home;
            ghost.f = [0.0; 3];
            for a in 0..3 {
                ghost.pos[a] += shift[a] * box_l[a];
            }
            if coupling::in_coupling_range(geometry, &ghost.pos) {
                cells.ghosts.push(ghost);
            }
        }
    }
    cells
}

fn build_domains(lbm_config: &LbmConfig, ctx: &LbContext, topology: &ProcessGrid) -> Vec<LbmDomain> {
    let domain_numbers = topology.size();
    let mut lbm_domains: Vec<LbmDomain> = Vec::with_capacity(domain_numbers);
    for d in 0..domain_numbers {
        log::info!("Initializing domain {}/{}", d + 1, domain_numbers);
        lbm_domains.push(LbmDomain::new(lbm_config, ctx, topology, d));
    }
    lbm_domains
}

/// Swap the + transfer buffer of domain `a` with the - transfer buffer of domain `b`.
fn swap_transfer_buffers(domains: &mut [LbmDomain], a: usize, b: usize) {
    if a == b {
        let t = &mut domains[a].transfer;
        std::mem::swap(&mut t.p, &mut t.m);
    } else if a < b {
        let (lo, hi) = domains.split_at_mut(b);
        std::mem::swap(&mut lo[a].transfer.p, &mut hi[0].transfer.m);
    } else {
        let (lo, hi) = domains.split_at_mut(a);
        std::mem::swap(&mut hi[0].transfer.p, &mut lo[b].transfer.m);
    }
}
