//! # multi-node
//! The solver supports execution on multiple compute nodes using the MPI protocol if compiled with the `multi-node` feature.
//!
//! Every MPI process owns exactly one `LbmDomain`. The number of processes has to match the number of domains
//! configured in the `LbmConfig`.
//!
//! ## MPI Error codes
//! - **100**: Incompatible domain number and number of execution nodes
//! - **101**: Invalid configuration

use mpi::{collective::SystemOperation, datatype::PartitionMut, point_to_point, topology::SimpleCommunicator, traits::*, Count};

use super::*;
use crate::{file, setup};

/// Run the solver on multiple compute nodes.
/// This function starts a single node with control over one `LbmDomain`. The root node reads the configuration
/// from `config_path` (or uses the demo setup) and distributes it.
pub fn run_node(config_path: Option<&str>) {
    let Some(universe) = mpi::initialize() else {
        log::error!("MPI could not be initialized");
        return;
    };
    let world: SimpleCommunicator = universe.world();
    let size = world.size();
    let rank = world.rank();
    rprintln("lbsolver - fluctuating lattice Boltzmann\n", &world);
    log::info!("Launched Node {} of {}", rank, size);

    let mut cfg: LbmConfig;
    if rank == 0 { // If root, read and send config to all nodes
        cfg = match config_path {
            Some(path) => match file::read_config(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::error!("Could not read {}: {}. Aborting", path, e);
                    world.abort(101);
                }
            },
            None => setup::demo_config(),
        };
        let ser_cfg = match bincode::serialize(&cfg) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Could not serialize LbmConfig: {}. Aborting", e);
                world.abort(101);
            }
        };
        log::info!("Distributing LbmConfig...");
        for i in 1..size {
            world.process_at_rank(i).send(&ser_cfg[..]);
        }
    } else { // receive config from root node
        let (ser_cfg_bytes, _status) = world.any_process().receive_vec::<u8>();
        cfg = match bincode::deserialize(&ser_cfg_bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("Node {} received an unreadable LbmConfig: {}. Aborting", rank, e);
                world.abort(101);
            }
        };
    }

    // Validate domain numbers/world size
    let domain_numbers: u32 = cfg.d_x * cfg.d_y * cfg.d_z;
    if size as u32 != domain_numbers {
        log::error!("Domain number and node mismatch. {} domains and {} nodes. Aborting", domain_numbers, size);
        world.abort(100);
    }

    let (ctx, mut domain) = match node_domain(&mut cfg, rank as usize) { // Build domain for node
        Ok(built) => built,
        Err(e) => {
            log::error!("Node {}: {}. Aborting", rank, e);
            world.abort(101);
        }
    };
    log::info!("Build domain at Node {}", rank);
    world.barrier();
    rprintln("Beginning execution\n", &world);
    domain.node_initialize(&world);

    let topology = cfg.topology();
    let box_l = cfg.box_l();
    let mut particles = setup::demo_particles(&cfg);
    let mut scheduler = UpdateScheduler::new();
    let md_steps = (cfg.run_steps as f64 * ctx.params.tau / ctx.time_step()).round() as u64;

    for step in 0..md_steps {
        let mut cells = domain_particles(&particles, box_l, &topology, rank as usize, &domain.geometry);
        if cfg.momentum_exchange {
            if let Err(e) = domain.node_couple_particles(&ctx, &mut cells, cfg.halo_checks, &world) {
                log::error!("Node {}: {}. Aborting", rank, e);
                world.abort(101);
            }
        }
        if scheduler.advance(ctx.time_step(), ctx.params.tau) {
            domain.node_do_time_step(&ctx, cfg.halo_checks, &world);
        }
        setup::drag_particles(&mut particles, ctx.time_step());
        if step % 100 == 0 {
            let diagnostics = domain.node_diagnostics(&world);
            rprintln(&format!("Step {}: {:?}", step, diagnostics), &world);
        }
    }
    let diagnostics = domain.node_diagnostics(&world);
    rprintln(&format!("Finished {} LB steps: {:?}", domain.t, diagnostics), &world);
}

/// Initialize the fluid context and the `LbmDomain` for a compute node
fn node_domain(cfg: &mut LbmConfig, rank: usize) -> LbResult<(LbContext, LbmDomain)> {
    check_cell_structure(&cfg.cell_structure)?;
    cfg.validate_resolution()?; // Validate and correct simulation size
    let ctx = LbContext::new(cfg.params, cfg.time_step, cfg.ext_volume_force)?;
    let domain = LbmDomain::new(cfg, &ctx, &cfg.topology(), rank);
    Ok((ctx, domain))
}

/// Blocking point to point exchange over the world communicator
struct MpiTransport<'a> {
    world: &'a SimpleCommunicator,
}

impl HaloTransport for MpiTransport<'_> {
    fn send_receive(&mut self, send: &[f64], dest: usize, recv: &mut [f64], source: usize) {
        point_to_point::send_receive_into(
            send,
            &self.world.process_at_rank(dest as i32),
            recv,
            &self.world.process_at_rank(source as i32),
        );
    }
}

// Additional functionality needed for multi-node exectution
impl LbmDomain {
    /// Readies the LBM Simulation to be run.
    /// Resets the fluid and fills the halo from the neighbouring nodes.
    pub fn node_initialize(&mut self, world: &SimpleCommunicator) {
        self.reinit_fluid();
        self.node_communicate_fi(world);
        self.t = 0;
    }

    /// Executes one LBM time step: halo exchange with the neighbouring nodes, boundaries, collision sweep.
    pub fn node_do_time_step(&mut self, ctx: &LbContext, halo_checks: bool, world: &SimpleCommunicator) {
        self.node_communicate_fi(world);
        if halo_checks {
            self.node_check_halo(world);
        }
        self.apply_boundaries();
        self.stream_collide(ctx);
    }

    // Domain communication
    /// Communicate Fi across domain boundaries
    pub fn node_communicate_fi(&mut self, world: &SimpleCommunicator) {
        world.barrier(); // Get all nodes ready for transfer
        let mut transport = MpiTransport { world };
        halo::execute(&self.plan, &mut self.store, &mut self.transfer, &mut transport);
    }

    /// Exchange the boundary layers a second time and compare them with the halo.
    /// Mismatches are logged and counted, returns their number.
    #[rustfmt::skip]
    pub fn node_check_halo(&mut self, world: &SimpleCommunicator) -> u64 {
        use halo::Direction::{Minus, Plus};
        let mut transport = MpiTransport { world };
        let mut mismatches = 0;
        for axis in Axis::ALL {
            let n = self.plan.message_len(axis);
            let plus = *self.plan.transfer(axis, Plus);
            let minus = *self.plan.transfer(axis, Minus);
            let mut expected_low = vec![0.0; n];
            let mut expected_high = vec![0.0; n];
            halo::pack(&plus.send, &self.store, &mut self.transfer.p[..n]);
            halo::pack(&minus.send, &self.store, &mut self.transfer.m[..n]);
            if self.plan.is_self_wrap(axis) {
                expected_low.copy_from_slice(&self.transfer.p[..n]);
                expected_high.copy_from_slice(&self.transfer.m[..n]);
            } else {
                transport.send_receive(&self.transfer.p[..n], plus.dest_rank, &mut expected_low, plus.source_rank);
                transport.send_receive(&self.transfer.m[..n], minus.dest_rank, &mut expected_high, minus.source_rank);
            }
            mismatches += halo::count_mismatches(&plus.recv, &self.store, &expected_low) as u64;
            mismatches += halo::count_mismatches(&minus.recv, &self.store, &expected_high) as u64;
        }
        if mismatches > 0 {
            log::error!("Halo check failed: {} mismatches on node {}", mismatches, self.rank);
            self.diagnostics.halo_mismatches += mismatches;
        }
        mismatches
    }

    // Particle coupling
    /// Couple the particles of this node to the fluid. Random forces of the local particles are shared with
    /// every node so ghost replicas use the numbers drawn at home.
    pub fn node_couple_particles(&mut self, ctx: &LbContext, cells: &mut ParticleCells, check_mass: bool, world: &SimpleCommunicator) -> LbResult<()> {
        self.node_communicate_fi(world);
        self.calc_flow_field(ctx);

        let draws = self.draw_random_forces(ctx, &mut cells.local);
        let identities: Vec<u64> = draws.iter().map(|(id, _)| *id).collect();
        let forces: Vec<f64> = draws.iter().flat_map(|(_, f)| f.iter().copied()).collect();

        // Gather the draw counts, then the draws of all nodes
        let d_n = world.size() as usize;
        let mut counts: Vec<Count> = vec![0; d_n];
        world.all_gather_into(&(identities.len() as Count), &mut counts[..]);
        let displs: Vec<Count> = counts.iter().scan(0, |offset, c| { let d = *offset; *offset += c; Some(d) }).collect();
        let total = counts.iter().sum::<Count>() as usize;

        let mut all_identities = vec![0u64; total];
        let mut partition = PartitionMut::new(&mut all_identities[..], counts.clone(), &displs[..]);
        world.all_gather_varcount_into(&identities[..], &mut partition);

        let force_counts: Vec<Count> = counts.iter().map(|c| 3 * c).collect();
        let force_displs: Vec<Count> = displs.iter().map(|d| 3 * d).collect();
        let mut all_forces = vec![0.0f64; 3 * total];
        let mut partition = PartitionMut::new(&mut all_forces[..], force_counts, force_displs);
        world.all_gather_varcount_into(&forces[..], &mut partition);

        let mut table = RandomForceTable::new();
        for (k, identity) in all_identities.iter().enumerate() {
            table.insert(*identity, [all_forces[3 * k], all_forces[3 * k + 1], all_forces[3 * k + 2]]);
        }
        table.apply_to_ghosts(&mut cells.ghosts)?;
        self.couple_particles(ctx, cells, check_mass)
    }

    /// Counters summed over all nodes, `ticks` is the maximum
    pub fn node_diagnostics(&self, world: &SimpleCommunicator) -> LbDiagnostics {
        let local = self.diagnostics.to_array();
        let mut global = [0u64; 5];
        world.all_reduce_into(&local[..], &mut global[..], SystemOperation::sum());
        let mut diagnostics = LbDiagnostics::from_array(global);
        world.all_reduce_into(&self.diagnostics.ticks, &mut diagnostics.ticks, SystemOperation::max());
        diagnostics
    }
}

/// Print only if root process. Needs access to comm-world
fn rprintln(str: &str, world: &SimpleCommunicator) {
    if world.rank() == 0 {
        log::info!("{str}");
    }
}
