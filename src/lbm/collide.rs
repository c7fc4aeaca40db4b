//! # collide
//!
//! The per-site collision in moment space and the sweep over the local sub-lattice.
//!
//! Per interior site:
//! 1. pull the 19 populations from the upstream neighbours (`n_i(x) = n_i(x - c_i)`)
//! 2. project onto the moment basis
//! 3. relax the stress modes, project out the ghost modes
//! 4. add thermal noise (only if the temperature is positive)
//! 5. add the external force (only if one is set)
//! 6. transform back and store into the post-collision buffer

use rand::Rng;
use rand_distr::StandardNormal;

use super::d3q19::{Q, W};
use super::lattice::LatticeGeometry;
use super::params::LbContext;
use super::store::DistributionStore;
use super::types::LbDiagnostics;

/// Relax the stress modes towards their equilibrium and reset the ghost modes.
#[rustfmt::skip]
pub fn relax_modes(ctx: &LbContext, m: &mut [f64; Q]) {
    let d = &ctx.derived;
    let rho = m[0] + d.avg_rho;
    let mut j = [m[1], m[2], m[3]];
    if d.has_ext_force() { // half step force contribution
        for a in 0..3 { j[a] += 0.5 * d.ext_force[a]; }
    }
    let jj = j[0] * j[0] + j[1] * j[1] + j[2] * j[2];

    // equilibrium part of the stress modes
    let pi_eq = [
        jj / rho,
        (j[0] * j[0] - j[1] * j[1]) / rho,
        (jj - 3.0 * j[2] * j[2]) / rho,
        j[0] * j[1] / rho,
        j[0] * j[2] / rho,
        j[1] * j[2] / rho,
    ];

    m[4] = pi_eq[0] + d.gamma_bulk * (m[4] - pi_eq[0]);
    for k in 5..10 {
        m[k] = pi_eq[k - 4] + d.gamma_shear * (m[k] - pi_eq[k - 4]);
    }
    for k in 10..Q {
        m[k] = 0.0;
    }
}

/// Add Gaussian noise of variance `rho * phi[k]^2` to the stress and ghost modes.
/// Returns the number of random numbers drawn.
pub fn thermalize_modes<R: Rng>(ctx: &LbContext, m: &mut [f64; Q], rng: &mut R) -> u64 {
    let d = &ctx.derived;
    let rootrho = (m[0] + d.avg_rho).max(0.0).sqrt();
    for k in 4..Q {
        let g: f64 = rng.sample(StandardNormal);
        m[k] += rootrho * d.phi[k] * g;
    }
    (Q - 4) as u64
}

/// Add the external force to the momentum modes and its velocity correction to the stress modes.
#[rustfmt::skip]
pub fn apply_forces(ctx: &LbContext, m: &mut [f64; Q]) {
    let d = &ctx.derived;
    let f = d.ext_force;
    let rho = m[0] + d.avg_rho;
    let (gb, gs) = (d.gamma_bulk, d.gamma_shear);

    let u = [(m[1] + 0.5 * f[0]) / rho, (m[2] + 0.5 * f[1]) / rho, (m[3] + 0.5 * f[2]) / rho];
    let uf = u[0] * f[0] + u[1] * f[1] + u[2] * f[2];

    let c_xx = (1.0 + gb) * u[0] * f[0] + (gb - gs) / 3.0 * uf;
    let c_yy = (1.0 + gb) * u[1] * f[1] + (gb - gs) / 3.0 * uf;
    let c_zz = (1.0 + gb) * u[2] * f[2] + (gb - gs) / 3.0 * uf;
    let c_xy = 0.5 * (1.0 + gs) * (u[0] * f[1] + u[1] * f[0]);
    let c_xz = 0.5 * (1.0 + gs) * (u[0] * f[2] + u[2] * f[0]);
    let c_yz = 0.5 * (1.0 + gs) * (u[1] * f[2] + u[2] * f[1]);

    m[1] += f[0];
    m[2] += f[1];
    m[3] += f[2];

    // projected on the same polynomials as the equilibrium stress modes
    m[4] += c_xx + c_yy + c_zz;
    m[5] += c_xx - c_yy;
    m[6] += c_xx + c_yy - 2.0 * c_zz;
    m[7] += c_xy;
    m[8] += c_xz;
    m[9] += c_yz;
}

/// Collision of one site from pre-collision populations.
pub fn collide<R: Rng>(ctx: &LbContext, n: &[f64; Q], rng: &mut R, diagnostics: &mut LbDiagnostics) -> [f64; Q] {
    let mut m = ctx.model.calc_modes(n);
    relax_modes(ctx, &mut m);
    if ctx.derived.fluct {
        diagnostics.random_draws += thermalize_modes(ctx, &mut m, rng);
    }
    if ctx.derived.has_ext_force() {
        apply_forces(ctx, &mut m);
    }
    ctx.model.calc_populations(&m)
}

/// `true` if any population of the site is negative in absolute terms.
pub fn has_negative_population(avg_rho: f64, n: &[f64; Q]) -> bool {
    (0..Q).any(|i| n[i] + W[i] * avg_rho < 0.0)
}

/// Stream and collide all interior sites into the post-collision buffer.
///
/// Sites flagged in `mask` are carried over unchanged. The halo of the current buffer has to be
/// up to date.
pub fn sweep<R: Rng>(
    ctx: &LbContext,
    geometry: &LatticeGeometry,
    store: &mut DistributionStore,
    mask: Option<&[bool]>,
    rng: &mut R,
    diagnostics: &mut LbDiagnostics,
) {
    let volume = store.volume();
    let strides: [isize; Q] = std::array::from_fn(|i| geometry.stride(i));
    let avg_rho = ctx.derived.avg_rho;
    let (current, next) = store.split_mut();

    for index in geometry.interior() {
        let site = index.0;
        if mask.map_or(false, |m| m[site]) {
            for i in 0..Q {
                next[i * volume + site] = current[i * volume + site];
            }
            continue;
        }

        // pull from upstream
        let n: [f64; Q] = std::array::from_fn(|i| current[i * volume + index.offset(-strides[i]).0]);
        let n = collide(ctx, &n, rng, diagnostics);

        if has_negative_population(avg_rho, &n) {
            diagnostics.negative_populations += 1;
            log::trace!("Negative population after collision at site {:?}", geometry.coordinates(index));
        }
        for i in 0..Q {
            next[i * volume + site] = n[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lbm::d3q19::{D3q19, C_SOUND_SQ};
    use crate::lbm::params::PhysicalParameters;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context(temperature: f64, ext_force: [f64; 3]) -> LbContext {
        let params = PhysicalParameters {
            agrid: 1.0,
            tau: 1.0,
            density: 1.0,
            viscosity: 0.3,
            bulk_viscosity: 0.2,
            friction: 1.0,
            temperature,
            ext_force,
        };
        LbContext::new(params, 1.0, true).unwrap()
    }

    fn equilibrium(rho: f64, j: [f64; 3]) -> [f64; Q] {
        let pi = [
            rho * C_SOUND_SQ + j[0] * j[0] / rho,
            j[0] * j[1] / rho,
            rho * C_SOUND_SQ + j[1] * j[1] / rho,
            j[0] * j[2] / rho,
            j[1] * j[2] / rho,
            rho * C_SOUND_SQ + j[2] * j[2] / rho,
        ];
        D3q19.equilibrium(1.0, rho, &j, &pi)
    }

    #[test]
    fn equilibrium_is_a_fixed_point() {
        let ctx = context(0.0, [0.0; 3]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut diag = LbDiagnostics::default();
        let n = equilibrium(1.03, [0.02, -0.01, 0.04]);
        let out = collide(&ctx, &n, &mut rng, &mut diag);
        for i in 0..Q {
            assert_abs_diff_eq!(out[i], n[i], epsilon = 1e-15);
        }
        assert_eq!(diag.random_draws, 0);
    }

    #[test]
    fn stress_modes_relax_geometrically() {
        let ctx = context(0.0, [0.0; 3]);
        let mut m = [0.0; Q];
        m[4] = 0.01;
        m[5] = 0.02;
        m[9] = -0.03;
        m[12] = 0.5;
        relax_modes(&ctx, &mut m);
        assert_relative_eq!(m[4], ctx.derived.gamma_bulk * 0.01, epsilon = 1e-15);
        assert_relative_eq!(m[5], ctx.derived.gamma_shear * 0.02, epsilon = 1e-15);
        assert_relative_eq!(m[9], ctx.derived.gamma_shear * -0.03, epsilon = 1e-15);
        assert_eq!(m[12], 0.0);
    }

    #[test]
    fn external_force_adds_momentum_not_mass() {
        let f = [1e-3, -2e-3, 5e-4];
        let ctx = context(0.0, f);
        let mut rng = StdRng::seed_from_u64(1);
        let mut diag = LbDiagnostics::default();
        let n = equilibrium(1.0, [0.0; 3]);
        let out = collide(&ctx, &n, &mut rng, &mut diag);
        let (rho, j, _) = D3q19.moments(1.0, &out);
        assert_relative_eq!(rho, 1.0, epsilon = 1e-14);
        for a in 0..3 {
            assert_relative_eq!(j[a], f[a], epsilon = 1e-14);
        }
    }

    #[test]
    fn force_correction_matches_stress_projection() {
        let f = [2e-3, -1e-3, 3e-3];
        let ctx = context(0.0, f);
        let (gb, gs) = (ctx.derived.gamma_bulk, ctx.derived.gamma_shear);
        let j = [0.02, 0.01, -0.03];
        let mut m = [0.0; Q];
        m[1..4].copy_from_slice(&j);
        apply_forces(&ctx, &mut m);

        let u: [f64; 3] = std::array::from_fn(|a| j[a] + 0.5 * f[a]);
        let uf = u[0] * f[0] + u[1] * f[1] + u[2] * f[2];
        let c = |a: usize, b: usize| {
            if a == b {
                (1.0 + gb) * u[a] * f[a] + (gb - gs) / 3.0 * uf
            } else {
                0.5 * (1.0 + gs) * (u[a] * f[b] + u[b] * f[a])
            }
        };
        // stress change C as populations, projected through the basis
        let p = C_SOUND_SQ;
        let pi = [c(0, 0) + p, c(0, 1), c(1, 1) + p, c(0, 2), c(1, 2), c(2, 2) + p];
        let expected = D3q19.calc_modes(&D3q19.equilibrium(1.0, 1.0, &[0.0; 3], &pi));
        for k in 4..10 {
            assert_relative_eq!(m[k], expected[k], max_relative = 1e-12);
        }
        for a in 0..3 {
            assert_relative_eq!(m[a + 1], j[a] + f[a], epsilon = 1e-15);
        }
    }

    #[test]
    fn negative_populations_are_counted_without_noise() {
        let ctx = context(0.0, [0.0; 3]);
        assert!(!ctx.derived.fluct);
        let geometry = LatticeGeometry::new([2, 2, 2], 1.0, [0.0; 3]);
        let mut store = DistributionStore::new(geometry.halo_grid_volume);
        let mut rng = StdRng::seed_from_u64(3);

        let mut diag = LbDiagnostics::default();
        sweep(&ctx, &geometry, &mut store, None, &mut rng, &mut diag);
        assert_eq!(diag.negative_populations, 0);

        // strong shear leaves populations along (1, -1, 0) negative after relaxation
        let p = C_SOUND_SQ;
        let n = D3q19.equilibrium(1.0, 1.0, &[0.0; 3], &[p, 0.5, p, 0.0, 0.0, p]);
        for site in 0..geometry.halo_grid_volume {
            store.set_node(crate::lbm::lattice::LinearIndex(site), &n);
        }
        let mut diag = LbDiagnostics::default();
        sweep(&ctx, &geometry, &mut store, None, &mut rng, &mut diag);
        assert_eq!(diag.negative_populations, 8);
        assert_eq!(diag.random_draws, 0);
    }

    #[test]
    fn thermalization_leaves_conserved_modes_alone() {
        let ctx = context(1e-4, [0.0; 3]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut diag = LbDiagnostics::default();
        let n = equilibrium(1.0, [0.01, 0.0, 0.0]);
        let out = collide(&ctx, &n, &mut rng, &mut diag);
        let m_in = D3q19.calc_modes(&n);
        let m_out = D3q19.calc_modes(&out);
        for k in 0..4 {
            assert_abs_diff_eq!(m_out[k], m_in[k], epsilon = 1e-15);
        }
        assert!(m_out[16].abs() > 0.0);
        assert_eq!(diag.random_draws, 15);
    }
}
