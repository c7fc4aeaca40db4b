//! # d3q19
//!
//! Static description of the D3Q19 velocity set and its orthogonal moment basis.
//!
//! Velocities are ordered rest, the six faces (+x, -x, +y, -y, +z, -z) and the twelve edges
//! grouped by plane (xy, xz, yz), every velocity directly followed by its opposite.
//! Modes are the projections `m_k = sum_i B[k][i] n_i`:
//! - `0`: density
//! - `1..4`: momentum
//! - `4..10`: stress (bulk, two shear differences, three off-diagonal)
//! - `10..19`: kinetic ghost modes

/// Number of discrete velocities
pub const Q: usize = 19;

/// Lattice speed of sound squared
pub const C_SOUND_SQ: f64 = 1.0 / 3.0;

/// Discrete velocities `c_i`
#[rustfmt::skip]
pub const C: [[i32; 3]; Q] = [
    [ 0, 0, 0],
    [ 1, 0, 0], [-1, 0, 0], [ 0, 1, 0], [ 0,-1, 0], [ 0, 0, 1], [ 0, 0,-1],
    [ 1, 1, 0], [-1,-1, 0], [ 1,-1, 0], [-1, 1, 0],
    [ 1, 0, 1], [-1, 0,-1], [ 1, 0,-1], [-1, 0, 1],
    [ 0, 1, 1], [ 0,-1,-1], [ 0, 1,-1], [ 0,-1, 1],
];

const W0: f64 = 1.0 / 3.0; // rest
const WS: f64 = 1.0 / 18.0; // straight (1-6)
const WE: f64 = 1.0 / 36.0; // edge (7-18)

/// Lattice weights `w_i`
#[rustfmt::skip]
pub const W: [f64; Q] = [
    W0,
    WS, WS, WS, WS, WS, WS,
    WE, WE, WE, WE, WE, WE, WE, WE, WE, WE, WE, WE,
];

/// Index of the opposite velocity `-c_i`
pub const OPPOSITE: [usize; Q] = [0, 2, 1, 4, 3, 6, 5, 8, 7, 10, 9, 12, 11, 14, 13, 16, 15, 18, 17];

/// Moment basis. Row `k` holds the polynomial of mode `k` evaluated at every velocity.
#[rustfmt::skip]
pub const BASIS: [[f64; Q]; Q] = [
    [ 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1.], // 1
    [ 0., 1.,-1., 0., 0., 0., 0., 1.,-1., 1.,-1., 1.,-1., 1.,-1., 0., 0., 0., 0.], // cx
    [ 0., 0., 0., 1.,-1., 0., 0., 1.,-1.,-1., 1., 0., 0., 0., 0., 1.,-1., 1.,-1.], // cy
    [ 0., 0., 0., 0., 0., 1.,-1., 0., 0., 0., 0., 1.,-1.,-1., 1., 1.,-1.,-1., 1.], // cz
    [-1., 0., 0., 0., 0., 0., 0., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1.], // c^2 - 1
    [ 0., 1., 1.,-1.,-1., 0., 0., 0., 0., 0., 0., 1., 1., 1., 1.,-1.,-1.,-1.,-1.], // cx^2 - cy^2
    [ 0., 1., 1., 1., 1.,-2.,-2., 2., 2., 2., 2.,-1.,-1.,-1.,-1.,-1.,-1.,-1.,-1.], // c^2 - 3 cz^2
    [ 0., 0., 0., 0., 0., 0., 0., 1., 1.,-1.,-1., 0., 0., 0., 0., 0., 0., 0., 0.], // cx cy
    [ 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 1., 1.,-1.,-1., 0., 0., 0., 0.], // cx cz
    [ 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 1., 1.,-1.,-1.], // cy cz
    [ 0.,-2., 2., 0., 0., 0., 0., 1.,-1., 1.,-1., 1.,-1., 1.,-1., 0., 0., 0., 0.], // (3c^2 - 5) cx
    [ 0., 0., 0.,-2., 2., 0., 0., 1.,-1.,-1., 1., 0., 0., 0., 0., 1.,-1., 1.,-1.], // (3c^2 - 5) cy
    [ 0., 0., 0., 0., 0.,-2., 2., 0., 0., 0., 0., 1.,-1.,-1., 1., 1.,-1.,-1., 1.], // (3c^2 - 5) cz
    [ 0., 0., 0., 0., 0., 0., 0., 1.,-1., 1.,-1.,-1., 1.,-1., 1., 0., 0., 0., 0.], // (cy^2 - cz^2) cx
    [ 0., 0., 0., 0., 0., 0., 0., 1.,-1.,-1., 1., 0., 0., 0., 0.,-1., 1.,-1., 1.], // (cx^2 - cz^2) cy
    [ 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 0., 1.,-1.,-1., 1.,-1., 1., 1.,-1.], // (cx^2 - cy^2) cz
    [ 1.,-2.,-2.,-2.,-2.,-2.,-2., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1.],
    [ 0.,-1.,-1., 1., 1., 0., 0., 0., 0., 0., 0., 1., 1., 1., 1.,-1.,-1.,-1.,-1.],
    [ 0.,-1.,-1.,-1.,-1., 2., 2., 2., 2., 2., 2.,-1.,-1.,-1.,-1.,-1.,-1.,-1.,-1.],
];

/// Weighted norms `sum_i w_i B[k][i]^2` of the basis rows
#[rustfmt::skip]
pub const NORMS: [f64; Q] = [
    1.0,
    1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0,
    2.0 / 3.0, 4.0 / 9.0, 4.0 / 3.0, 1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0,
    2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0, 2.0 / 9.0, 2.0 / 9.0, 2.0 / 9.0,
    2.0, 4.0 / 9.0, 4.0 / 3.0,
];

/// Zero sized handle on the D3Q19 model. Carried by [`LbContext`] so operations name the
/// velocity set they work with.
///
/// [`LbContext`]: crate::lbm::LbContext
#[derive(Clone, Copy, Debug, Default)]
pub struct D3q19;

impl D3q19 {
    /// Project populations onto the moment basis.
    pub fn calc_modes(&self, n: &[f64; Q]) -> [f64; Q] {
        let mut m = [0.0; Q];
        for (k, row) in BASIS.iter().enumerate() {
            m[k] = row.iter().zip(n.iter()).map(|(b, n)| b * n).sum();
        }
        m
    }

    /// Inverse of [`D3q19::calc_modes`].
    pub fn calc_populations(&self, m: &[f64; Q]) -> [f64; Q] {
        let mut scaled = [0.0; Q];
        for k in 0..Q {
            scaled[k] = m[k] / NORMS[k];
        }
        let mut n = [0.0; Q];
        for i in 0..Q {
            let s: f64 = (0..Q).map(|k| BASIS[k][i] * scaled[k]).sum();
            n[i] = W[i] * s;
        }
        n
    }

    /// Populations (as deviations from `w_i * avg_rho`) of the second order equilibrium with
    /// density `rho`, momentum density `j` and stress `pi` (`xx, xy, yy, xz, yz, zz`).
    pub fn equilibrium(&self, avg_rho: f64, rho: f64, j: &[f64; 3], pi: &[f64; 6]) -> [f64; Q] {
        let rho_dev = rho - avg_rho;
        // stress deviation from the isotropic pressure part
        let p = rho * C_SOUND_SQ;
        let pi_dev = [
            [pi[0] - p, pi[1], pi[3]],
            [pi[1], pi[2] - p, pi[4]],
            [pi[3], pi[4], pi[5] - p],
        ];
        let mut n = [0.0; Q];
        for i in 0..Q {
            let c = [C[i][0] as f64, C[i][1] as f64, C[i][2] as f64];
            let cj = c[0] * j[0] + c[1] * j[1] + c[2] * j[2];
            let mut cpic = 0.0;
            for a in 0..3 {
                for b in 0..3 {
                    let delta = if a == b { C_SOUND_SQ } else { 0.0 };
                    cpic += pi_dev[a][b] * (c[a] * c[b] - delta);
                }
            }
            n[i] = W[i]
                * (rho_dev + cj / C_SOUND_SQ + cpic / (2.0 * C_SOUND_SQ * C_SOUND_SQ));
        }
        n
    }

    /// Population increments that add momentum `dj` to a site without changing its mass.
    pub fn momentum_increment(&self, dj: &[f64; 3]) -> [f64; Q] {
        let mut dn = [0.0; Q];
        for i in 0..Q {
            let cj = C[i][0] as f64 * dj[0] + C[i][1] as f64 * dj[1] + C[i][2] as f64 * dj[2];
            dn[i] = W[i] * cj / C_SOUND_SQ;
        }
        dn
    }

    /// Hydrodynamic moments of one site: `(rho, j, pi)`. `pi` is ordered `xx, xy, yy, xz, yz, zz`.
    pub fn moments(&self, avg_rho: f64, n: &[f64; Q]) -> (f64, [f64; 3], [f64; 6]) {
        let mut rho = avg_rho;
        let mut j = [0.0; 3];
        let mut pi = [0.0; 6];
        for i in 0..Q {
            let c = [C[i][0] as f64, C[i][1] as f64, C[i][2] as f64];
            rho += n[i];
            j[0] += n[i] * c[0];
            j[1] += n[i] * c[1];
            j[2] += n[i] * c[2];
            pi[0] += n[i] * c[0] * c[0];
            pi[1] += n[i] * c[0] * c[1];
            pi[2] += n[i] * c[1] * c[1];
            pi[3] += n[i] * c[0] * c[2];
            pi[4] += n[i] * c[1] * c[2];
            pi[5] += n[i] * c[2] * c[2];
        }
        // reference populations carry the pressure avg_rho * c_s^2
        pi[0] += avg_rho * C_SOUND_SQ;
        pi[2] += avg_rho * C_SOUND_SQ;
        pi[5] += avg_rho * C_SOUND_SQ;
        (rho, j, pi)
    }
}
