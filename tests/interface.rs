use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use lbsolver::lbm::*;

fn config() -> LbmConfig {
    let mut cfg = LbmConfig::new();
    (cfg.n_x, cfg.n_y, cfg.n_z) = (8, 4, 4);
    cfg.d_x = 2;
    cfg.time_step = 0.1;
    cfg.params.agrid = 0.5;
    cfg.params.tau = 0.2;
    cfg.params.density = 0.8;
    cfg
}

#[test]
fn unsuitable_setups_are_rejected() {
    let mut cfg = config();
    cfg.cell_structure.kind = CellStructureKind::Nsquare;
    assert!(matches!(Lbm::new(cfg), Err(LbError::NotDomainDecomposition)));

    let mut cfg = config();
    cfg.cell_structure.use_verlet_lists = true;
    assert!(matches!(Lbm::new(cfg), Err(LbError::VerletListsEnabled)));

    let mut cfg = config();
    cfg.params.tau = 0.05;
    assert!(matches!(Lbm::new(cfg), Err(LbError::TimeStepTooLarge { .. })));

    let mut cfg = config();
    cfg.params.ext_force = [0.0, 0.0, 1.0];
    assert!(matches!(Lbm::new(cfg), Err(LbError::ExternalForceDisabled { .. })));

    let mut cfg = config();
    cfg.params.viscosity = -1.0;
    assert!(matches!(Lbm::new(cfg), Err(LbError::InvalidParameter { name: "viscosity", .. })));

    let mut cfg = config();
    cfg.d_y = 8;
    assert!(matches!(Lbm::new(cfg), Err(LbError::InvalidLattice { .. })));
}

#[test]
fn indivisible_resolution_is_rounded_down() {
    let mut cfg = config();
    cfg.n_x = 9;
    let lbm = Lbm::new(cfg).unwrap();
    assert_eq!(lbm.config().n_x, 8);
    assert_eq!(lbm.domains[1].geometry.grid, [4, 4, 4]);
    assert_relative_eq!(lbm.domains[1].geometry.my_left[0], 2.0);
}

#[test]
fn node_values_are_converted_to_md_units() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    assert_relative_eq!(lbm.average_density(), 0.8, epsilon = 1e-12);
    assert_relative_eq!(lbm.total_mass(), 0.8 * 4.0 * 2.0 * 2.0, epsilon = 1e-12);

    let v = [0.3, -0.1, 0.2];
    lbm.set_node_velocity([5, 1, 3], 1.2, v).unwrap();
    let node = lbm.get_node([5, 1, 3]).unwrap();
    assert_relative_eq!(node.rho, 1.2, epsilon = 1e-12);
    // lattice j = rho a^3 v tau / a, back to MD units by a / tau
    for a in 0..3 {
        assert_relative_eq!(node.j[a], 1.2 * 0.125 * v[a], epsilon = 1e-12);
    }
    assert_relative_eq!(node.pi[1], 1.2 * v[0] * v[1], epsilon = 1e-12);
    // pressure in MD units: rho c_s^2 (agrid / tau)^2
    assert_relative_eq!(node.pi[5], 1.2 * v[2] * v[2] + 1.2 / 3.0 * 6.25, epsilon = 1e-12);
    for p in lbm.get_node_pi_neq([5, 1, 3]).unwrap() {
        assert_abs_diff_eq!(p, 0.0, epsilon = 1e-12);
    }

    let rest = lbm.get_node([4, 1, 3]).unwrap();
    assert_relative_eq!(rest.rho, 0.8, epsilon = 1e-12);

    assert!(matches!(lbm.get_node([8, 0, 0]), Err(LbError::NodeOutOfRange { .. })));
    assert!(lbm.set_node_velocity([0, 4, 0], 1.0, v).is_err());
}

#[test]
fn parameter_changes_rebuild_what_they_affect() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    lbm.set_node_velocity([1, 1, 1], 0.8, [0.1, 0.0, 0.0]).unwrap();

    lbm.set_parameter(ParameterChange::Viscosity(0.5)).unwrap();
    assert_relative_eq!(lbm.get_node([1, 1, 1]).unwrap().j[0], 0.8 * 0.125 * 0.1, epsilon = 1e-12);
    assert_relative_eq!(lbm.ctx().derived().gamma_shear, 1.0 - 2.0 / (6.0 * 0.4 + 1.0), epsilon = 1e-12);

    lbm.set_parameter(ParameterChange::Density(1.5)).unwrap();
    assert_relative_eq!(lbm.average_density(), 1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(lbm.get_node([1, 1, 1]).unwrap().j[0], 0.0, epsilon = 1e-14);

    lbm.set_parameter(ParameterChange::Agrid(0.25)).unwrap();
    assert_eq!((lbm.config().n_x, lbm.config().n_y, lbm.config().n_z), (16, 8, 8));
    assert_eq!(lbm.domains[0].geometry.grid, [8, 8, 8]);
    assert_relative_eq!(lbm.average_density(), 1.5, epsilon = 1e-12);

    // 4 / 0.3 nodes do not fit the box, nothing changes
    assert!(lbm.set_parameter(ParameterChange::Agrid(0.3)).is_err());
    assert_eq!(lbm.config().n_x, 16);
    assert!(lbm.set_parameter(ParameterChange::Tau(0.01)).is_err());
    assert_relative_eq!(lbm.ctx().params().tau, 0.2);
}

#[test]
fn momentum_density_scales_by_tau_over_agrid() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    let p = 0.8 * C_SOUND_SQ * 6.25;
    let fields = NodeFields { rho: 0.8, j: [1.0, 0.0, -0.5], pi: [p, 0.0, p, 0.0, 0.0, p] };
    lbm.set_node([1, 1, 1], &fields).unwrap();

    let index = lbm.domains[0].node_index([1, 1, 1]).unwrap();
    let lattice = lbm.domains[0].local_fields(lbm.ctx(), index);
    assert_relative_eq!(lattice.rho, 0.8 * 0.125, epsilon = 1e-12);
    assert_relative_eq!(lattice.j[0], 0.4, epsilon = 1e-12);
    assert_relative_eq!(lattice.j[2], -0.2, epsilon = 1e-12);

    let node = lbm.get_node([1, 1, 1]).unwrap();
    assert_relative_eq!(node.j[0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(node.j[2], -0.5, epsilon = 1e-12);
}

#[test]
fn parameter_reads_follow_parameter_changes() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    lbm.set_parameter(ParameterChange::Tau(0.4)).unwrap();

    let ctx = lbm.ctx();
    assert_relative_eq!(ctx.params().tau, 0.4);
    assert_relative_eq!(ctx.units().tau, 0.4);
    assert_relative_eq!(lbm.config().params.tau, 0.4);
    // nu = 1/6 in MD units, 1/6 * 0.4 / 0.25 on the lattice
    assert_relative_eq!(ctx.derived().gamma_shear, 1.0 - 2.0 / (6.0 * (1.0 / 6.0) * 1.6 + 1.0), epsilon = 1e-12);
    assert!(!ctx.derived().fluct);

    lbm.set_parameter(ParameterChange::Temperature(0.01)).unwrap();
    assert!(lbm.ctx().derived().fluct);
    assert_relative_eq!(lbm.ctx().params().temperature, 0.01);
    assert_relative_eq!(lbm.config().params.temperature, 0.01);
}

struct FixedDensity {
    calls: Arc<AtomicUsize>,
    populations: [f64; 19],
}

impl BoundaryConditions for FixedDensity {
    fn apply(&mut self, geometry: &LatticeGeometry, mask: &[bool], store: &mut DistributionStore) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for index in geometry.interior() {
            if mask[index.0] {
                store.set_node(index, &self.populations);
            }
        }
    }
}

#[test]
fn boundary_sites_are_left_to_the_boundary_hook() {
    let mut cfg = config();
    cfg.d_x = 1;
    let mut lbm = Lbm::new(cfg).unwrap();
    lbm.initialize();

    let avg_rho = lbm.ctx().derived().avg_rho;
    let rho = 2.0 * avg_rho;
    let p = rho * C_SOUND_SQ;
    let populations = D3q19.equilibrium(avg_rho, rho, &[0.0; 3], &[p, 0.0, p, 0.0, 0.0, p]);

    let domain = &lbm.domains[0];
    let wall = domain.node_index([2, 2, 2]).unwrap();
    let mut mask = vec![false; domain.geometry.halo_grid_volume];
    mask[wall.0] = true;
    let calls = Arc::new(AtomicUsize::new(0));
    let conditions = FixedDensity { calls: calls.clone(), populations };
    lbm.set_boundary(0, Boundary::new(mask, Box::new(conditions))).unwrap();

    lbm.run(3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let node = lbm.get_node([2, 2, 2]).unwrap();
    assert_relative_eq!(node.rho, 2.0 * 0.8, epsilon = 1e-12);
    // totals are reduced in parallel with the hook attached
    assert!(lbm.total_mass() > 0.8 * 4.0 * 2.0 * 2.0);
}

#[test]
fn boundaries_are_checked_against_the_lattice() {
    let mut lbm = Lbm::new(config()).unwrap();
    let volume = lbm.domains[0].geometry.halo_grid_volume;
    let hook = || FixedDensity { calls: Arc::new(AtomicUsize::new(0)), populations: [0.0; 19] };

    let result = lbm.set_boundary(2, Boundary::new(vec![false; volume], Box::new(hook())));
    assert!(matches!(result, Err(LbError::NoSuchDomain { domain: 2, domains: 2 })));

    let result = lbm.set_boundary(1, Boundary::new(vec![false; volume - 1], Box::new(hook())));
    assert!(matches!(result, Err(LbError::BoundaryMaskSize { .. })));
    assert!(lbm.domains[1].boundary.is_none());

    assert!(lbm.set_boundary(1, Boundary::new(vec![false; volume], Box::new(hook()))).is_ok());
    assert!(lbm.domains[1].boundary.is_some());
}

#[test]
fn coupling_needs_one_cell_list_per_domain() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    let mut cells = vec![ParticleCells::default()];
    assert!(matches!(lbm.couple_particles(&mut cells), Err(LbError::DomainMismatch { domains: 2, nodes: 1 })));
}

#[test]
fn ghosts_without_owner_are_an_error() {
    let mut lbm = Lbm::new(config()).unwrap();
    lbm.initialize();
    let mut cells = vec![ParticleCells::default(); 2];
    cells[1].ghosts.push(Particle::new(9, [1.9, 0.5, 0.5], [0.0; 3]));
    assert!(matches!(lbm.couple_particles(&mut cells), Err(LbError::OrphanGhost { identity: 9 })));
}
