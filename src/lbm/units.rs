//! # units
//!
//! Holds the `Units` struct and associated unit conversion functions.

/// Unit conversion factors between MD units and lattice units.
///
/// Lattice masses equal MD masses, lattice lengths are measured in `agrid` and lattice times in `tau`:
///
/// MD unit * factor = lattice unit eg. velocityMD * tau / agrid = velocityLU
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Units {
    /// lattice spacing
    pub agrid: f64,
    /// LB time step
    pub tau: f64,
    /// MD time step
    pub time_step: f64,
}

impl Units {
    pub fn new(agrid: f64, tau: f64, time_step: f64) -> Units {
        Units { agrid, tau, time_step }
    }

    // to lattice units from MD units
    pub fn md_to_dens(&self, rho: f64) -> f64 {
        rho * cb(self.agrid)
    }

    pub fn md_to_speed(&self, v: f64) -> f64 {
        v * self.tau / self.agrid
    }

    /// Node momentum density, scaled like a velocity
    pub fn md_to_momentum_density(&self, j: f64) -> f64 {
        j * self.tau / self.agrid
    }

    pub fn md_to_stress(&self, pi: f64) -> f64 {
        pi * cb(self.agrid) * sq(self.tau / self.agrid)
    }

    /// Kinematic viscosity in lattice units
    pub fn md_to_nu(&self, nu: f64) -> f64 {
        nu * self.tau / sq(self.agrid)
    }

    /// Momentum a force density deposits into one node during one LB step
    pub fn md_to_force_density(&self, f: f64) -> f64 {
        f * sq(self.agrid) * sq(self.tau)
    }

    /// Lattice momentum transferred by a force acting for one MD step
    pub fn force_to_momentum(&self, f: f64) -> f64 {
        f * self.time_step * self.tau / self.agrid
    }

    // to MD units from lattice units
    pub fn dens_to_md(&self, rho: f64) -> f64 {
        rho / cb(self.agrid)
    }

    pub fn speed_to_md(&self, v: f64) -> f64 {
        v * self.agrid / self.tau
    }

    pub fn momentum_density_to_md(&self, j: f64) -> f64 {
        j * self.agrid / self.tau
    }

    pub fn stress_to_md(&self, pi: f64) -> f64 {
        pi / (cb(self.agrid) * sq(self.tau / self.agrid))
    }

    pub fn print(&self) {
        log::info!(
            "Units: agrid = {}, tau = {}, MD time step = {}",
            self.agrid,
            self.tau,
            self.time_step
        );
    }
}

#[inline]
fn sq(x: f64) -> f64 {
    x * x
}

#[inline]
fn cb(x: f64) -> f64 {
    x * x * x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn conversions_invert() {
        let u = Units::new(0.5, 0.02, 0.01);
        assert_relative_eq!(u.dens_to_md(u.md_to_dens(0.87)), 0.87, epsilon = 1e-14);
        assert_relative_eq!(u.speed_to_md(u.md_to_speed(3.1)), 3.1, epsilon = 1e-14);
        assert_relative_eq!(u.momentum_density_to_md(u.md_to_momentum_density(-1.7)), -1.7, epsilon = 1e-14);
        assert_relative_eq!(u.stress_to_md(u.md_to_stress(2.2)), 2.2, epsilon = 1e-14);
    }

    #[test]
    fn momentum_density_scales_by_tau_over_agrid() {
        let u = Units::new(0.5, 0.2, 0.1);
        assert_relative_eq!(u.md_to_momentum_density(1.0), 0.4, epsilon = 1e-14);
        assert_relative_eq!(u.momentum_density_to_md(0.4), 1.0, epsilon = 1e-14);
        // same scaling as a velocity
        assert_relative_eq!(u.md_to_momentum_density(1.3 * 0.4), u.md_to_speed(1.3 * 0.4), epsilon = 1e-14);
    }
}
