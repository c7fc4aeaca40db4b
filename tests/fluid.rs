use approx::{assert_abs_diff_eq, assert_relative_eq};
use lbsolver::lbm::d3q19::{D3q19, Q};
use lbsolver::lbm::*;

fn config(n: u32, temperature: f64) -> LbmConfig {
    let mut cfg = LbmConfig::new();
    cfg.n_x = n;
    cfg.n_y = n;
    cfg.n_z = n;
    cfg.params.viscosity = 0.5;
    cfg.params.bulk_viscosity = 0.3;
    cfg.params.temperature = temperature;
    cfg.halo_checks = true;
    cfg.seed = 11;
    cfg
}

#[test]
fn thermal_fluid_conserves_mass_and_momentum() {
    // noise amplitude well inside the positive population regime
    let mut lbm = Lbm::new(config(6, 1e-4)).unwrap();
    lbm.initialize();
    let mass0 = lbm.total_mass();
    assert_relative_eq!(mass0, 216.0, epsilon = 1e-12);

    lbm.run(20);
    assert_relative_eq!(lbm.total_mass(), mass0, max_relative = 1e-12);
    for j in lbm.total_momentum() {
        assert_abs_diff_eq!(j, 0.0, epsilon = 1e-10);
    }
    let diagnostics = lbm.diagnostics();
    assert_eq!(diagnostics.ticks, 20);
    assert_eq!(diagnostics.halo_mismatches, 0);
    assert_eq!(diagnostics.random_draws, 20 * 216 * 15);
    assert_eq!(diagnostics.negative_populations, 0);
}

#[test]
fn external_force_accelerates_the_fluid_uniformly() {
    let mut cfg = config(4, 0.0);
    cfg.params.agrid = 0.5;
    cfg.params.tau = 0.2;
    cfg.time_step = 0.1;
    cfg.ext_volume_force = true;
    let f = [1e-3, 0.0, -2e-3];
    cfg.params.ext_force = f;
    let mut lbm = Lbm::new(cfg).unwrap();
    lbm.initialize();

    // box volume 2^3, one tick lasts tau
    let volume = 8.0;
    for k in 1..=3 {
        lbm.run(1);
        let j = lbm.total_momentum();
        for a in 0..3 {
            assert_abs_diff_eq!(j[a], k as f64 * volume * f[a] * 0.2, epsilon = 1e-12);
        }
    }
    assert_relative_eq!(lbm.total_mass(), 8.0, max_relative = 1e-12);
    assert_eq!(lbm.diagnostics().negative_populations, 0);
}

#[test]
fn shear_stress_decays_with_gamma_shear() {
    let mut lbm = Lbm::new(config(4, 0.0)).unwrap();
    lbm.initialize();
    let cs2 = 1.0 / 3.0;
    let perturbed = NodeFields { rho: 1.0, j: [0.0; 3], pi: [cs2, 0.01, cs2, -0.02, 0.0, cs2] };
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                lbm.set_node([x, y, z], &perturbed).unwrap();
            }
        }
    }
    let gamma = lbm.ctx().derived().gamma_shear;
    assert_relative_eq!(gamma, 0.5, epsilon = 1e-14);

    for k in 1..=3 {
        lbm.run(1);
        let pi_neq = lbm.get_node_pi_neq([1, 2, 3]).unwrap();
        assert_relative_eq!(pi_neq[1], 0.01 * gamma.powi(k), max_relative = 1e-10);
        assert_relative_eq!(pi_neq[3], -0.02 * gamma.powi(k), max_relative = 1e-10);
        assert_abs_diff_eq!(pi_neq[4], 0.0, epsilon = 1e-14);
    }

    // without noise the ghost modes are projected out completely
    let domain = &lbm.domains[0];
    for index in domain.geometry.interior() {
        let m = D3q19.calc_modes(&domain.store.node(index));
        for k in 10..Q {
            assert_abs_diff_eq!(m[k], 0.0, epsilon = 1e-14);
        }
    }
}

#[test]
fn uniform_flow_is_stationary() {
    let mut lbm = Lbm::new(config(4, 0.0)).unwrap();
    lbm.initialize();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                lbm.set_node_velocity([x, y, z], 1.0, [0.05, -0.02, 0.01]).unwrap();
            }
        }
    }
    lbm.run(5);
    let node = lbm.get_node([3, 0, 2]).unwrap();
    assert_relative_eq!(node.rho, 1.0, epsilon = 1e-12);
    let v = node.velocity();
    assert_relative_eq!(v[0], 0.05, epsilon = 1e-12);
    assert_relative_eq!(v[1], -0.02, epsilon = 1e-12);
    assert_relative_eq!(v[2], 0.01, epsilon = 1e-12);
}

#[test]
fn ghost_mode_variance_matches_noise_amplitude() {
    let mut lbm = Lbm::new(config(10, 0.2)).unwrap();
    lbm.initialize();
    lbm.run(1);

    let derived = lbm.ctx().derived();
    let domain = &lbm.domains[0];
    let mut ratio = 0.0;
    let mut samples = 0;
    for index in domain.geometry.interior() {
        let m = D3q19.calc_modes(&domain.store.node(index));
        for k in 10..Q {
            ratio += m[k] * m[k] / (derived.avg_rho * derived.phi[k] * derived.phi[k]);
            samples += 1;
        }
    }
    let ratio = ratio / samples as f64;
    assert!((ratio - 1.0).abs() < 0.1, "ghost mode variance ratio {}", ratio);
}

#[test]
fn scheduler_ticks_once_per_tau() {
    let mut cfg = config(4, 0.0);
    cfg.params.tau = 0.5;
    cfg.time_step = 0.1;
    let mut lbm = Lbm::new(cfg).unwrap();
    let ticks = (0..20).filter(|_| lbm.advance(0.1)).count();
    assert_eq!(ticks, 4);
    assert_eq!(lbm.get_time_step(), 4);
}
