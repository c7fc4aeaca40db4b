//! # params
//!
//! Physical fluid parameters, their validation and the lattice quantities derived from them.
//!
//! [`LbContext`] bundles everything a collision or coupling operation needs to know about the
//! fluid. It is rebuilt as a whole whenever a parameter changes, so derived quantities are never
//! stale.

use serde::{Deserialize, Serialize};

use super::d3q19::{D3q19, C_SOUND_SQ, NORMS, Q};
use super::error::{LbError, LbResult};
use super::units::Units;

/// Fluid parameters in MD units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Lattice spacing
    pub agrid: f64,
    /// LB time step
    pub tau: f64,
    /// Fluid density
    pub density: f64,
    /// Kinematic viscosity
    pub viscosity: f64,
    /// Bulk viscosity. `0` disables bulk relaxation memory (`gamma_bulk = 0`)
    pub bulk_viscosity: f64,
    /// Particle-fluid friction coefficient
    pub friction: f64,
    /// Thermal energy `kT`. `0` disables fluctuations
    pub temperature: f64,
    /// External force density. Needs ext_volume_force to work
    pub ext_force: [f64; 3],
}

impl Default for PhysicalParameters {
    fn default() -> Self {
        PhysicalParameters {
            agrid: 1.0,
            tau: 1.0,
            density: 1.0,
            viscosity: 1.0 / 6.0,
            bulk_viscosity: 0.0,
            friction: 1.0,
            temperature: 0.0,
            ext_force: [0.0; 3],
        }
    }
}

/// A single parameter update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterChange {
    Agrid(f64),
    Tau(f64),
    Density(f64),
    Viscosity(f64),
    BulkViscosity(f64),
    Friction(f64),
    Temperature(f64),
    ExtForce([f64; 3]),
}

/// What has to be rebuilt after a parameter change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeScope {
    /// Relaxation rates and noise amplitudes only
    Parameters,
    /// Fluid has to be reset to equilibrium
    Fluid,
    /// Lattice, store and halo plan have to be rebuilt
    Geometry,
}

impl ParameterChange {
    pub fn scope(&self) -> ChangeScope {
        match self {
            ParameterChange::Agrid(_) => ChangeScope::Geometry,
            ParameterChange::Density(_) => ChangeScope::Fluid,
            _ => ChangeScope::Parameters,
        }
    }
}

impl PhysicalParameters {
    /// Checks every parameter against its admissible range.
    pub fn validate(&self, time_step: f64, ext_volume_force: bool) -> LbResult<()> {
        positive("agrid", self.agrid)?;
        positive("tau", self.tau)?;
        positive("time_step", time_step)?;
        if self.tau < time_step {
            return Err(LbError::TimeStepTooLarge { tau: self.tau, time_step });
        }
        positive("density", self.density)?;
        positive("viscosity", self.viscosity)?;
        non_negative("bulk_viscosity", self.bulk_viscosity)?;
        positive("friction", self.friction)?;
        non_negative("temperature", self.temperature)?;
        for f in self.ext_force {
            if !f.is_finite() {
                return Err(LbError::InvalidParameter { name: "ext_force", value: f, requirement: "must be finite" });
            }
        }
        if !ext_volume_force && self.ext_force != [0.0; 3] {
            return Err(LbError::ExternalForceDisabled { force: self.ext_force });
        }
        Ok(())
    }

    /// Returns a validated copy with `change` applied. `self` is untouched on error.
    pub fn with_change(&self, change: ParameterChange, time_step: f64, ext_volume_force: bool) -> LbResult<PhysicalParameters> {
        let mut p = *self;
        match change {
            ParameterChange::Agrid(v) => p.agrid = v,
            ParameterChange::Tau(v) => p.tau = v,
            ParameterChange::Density(v) => p.density = v,
            ParameterChange::Viscosity(v) => p.viscosity = v,
            ParameterChange::BulkViscosity(v) => p.bulk_viscosity = v,
            ParameterChange::Friction(v) => p.friction = v,
            ParameterChange::Temperature(v) => p.temperature = v,
            ParameterChange::ExtForce(f) => p.ext_force = f,
        }
        p.validate(time_step, ext_volume_force)?;
        Ok(p)
    }
}

fn positive(name: &'static str, value: f64) -> LbResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(LbError::InvalidParameter { name, value, requirement: "must be positive" })
    }
}

fn non_negative(name: &'static str, value: f64) -> LbResult<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(LbError::InvalidParameter { name, value, requirement: "must not be negative" })
    }
}

/// Lattice quantities derived from [`PhysicalParameters`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedParameters {
    /// Relaxation factor of the shear modes
    pub gamma_shear: f64,
    /// Relaxation factor of the bulk mode
    pub gamma_bulk: f64,
    /// Noise amplitude per mode
    pub phi: [f64; Q],
    /// `true` if thermal fluctuations are switched on
    pub fluct: bool,
    /// Amplitude of the random coupling force
    pub coupling_prefactor: f64,
    /// Reference density per node
    pub avg_rho: f64,
    /// External force per node and LB step
    pub ext_force: [f64; 3],
}

impl DerivedParameters {
    pub fn derive(params: &PhysicalParameters, units: &Units) -> DerivedParameters {
        let gamma_shear = 1.0 - 2.0 / (6.0 * units.md_to_nu(params.viscosity) + 1.0);
        let gamma_bulk = if params.bulk_viscosity > 0.0 {
            1.0 - 2.0 / (9.0 * units.md_to_nu(params.bulk_viscosity) + 1.0)
        } else {
            0.0
        };

        let fluct = params.temperature > 0.0;
        let mut phi = [0.0; Q];
        if fluct {
            // noise variance in lattice units
            let mu = params.temperature / C_SOUND_SQ * units.tau * units.tau / (units.agrid * units.agrid);
            phi[4] = (mu * NORMS[4] * (1.0 - gamma_bulk * gamma_bulk)).sqrt();
            for k in 5..10 {
                phi[k] = (mu * NORMS[k] * (1.0 - gamma_shear * gamma_shear)).sqrt();
            }
            for k in 10..Q {
                phi[k] = (mu * NORMS[k]).sqrt();
            }
        }

        DerivedParameters {
            gamma_shear,
            gamma_bulk,
            phi,
            fluct,
            coupling_prefactor: (24.0 * params.friction * params.temperature / units.time_step).sqrt(),
            avg_rho: units.md_to_dens(params.density),
            ext_force: params.ext_force.map(|f| units.md_to_force_density(f)),
        }
    }

    /// Whether the external force step has to run.
    pub fn has_ext_force(&self) -> bool {
        self.ext_force != [0.0; 3]
    }
}

/// Everything an LB operation needs to know about the fluid.
///
/// Fields are read through accessors. Parameters only change through [`LbContext::apply`], which
/// re-derives everything depending on them.
#[derive(Clone, Debug)]
pub struct LbContext {
    pub(crate) model: D3q19,
    pub(crate) params: PhysicalParameters,
    pub(crate) derived: DerivedParameters,
    pub(crate) units: Units,
    /// Enable volume force extension
    pub(crate) ext_volume_force: bool,
}

impl LbContext {
    pub fn new(params: PhysicalParameters, time_step: f64, ext_volume_force: bool) -> LbResult<LbContext> {
        params.validate(time_step, ext_volume_force)?;
        let units = Units::new(params.agrid, params.tau, time_step);
        Ok(LbContext {
            model: D3q19,
            derived: DerivedParameters::derive(&params, &units),
            params,
            units,
            ext_volume_force,
        })
    }

    /// Applies `change` and re-derives all lattice quantities. The context is untouched on error.
    pub fn apply(&mut self, change: ParameterChange) -> LbResult<ChangeScope> {
        let params = self.params.with_change(change, self.units.time_step, self.ext_volume_force)?;
        *self = LbContext::new(params, self.units.time_step, self.ext_volume_force)?;
        log::debug!("Applied {:?}, gamma_shear = {}, gamma_bulk = {}", change, self.derived.gamma_shear, self.derived.gamma_bulk);
        Ok(change.scope())
    }

    /// MD time step
    pub fn time_step(&self) -> f64 {
        self.units.time_step
    }

    pub fn model(&self) -> D3q19 {
        self.model
    }

    /// Physical parameters in MD units
    pub fn params(&self) -> &PhysicalParameters {
        &self.params
    }

    /// Lattice quantities derived from [`LbContext::params`]
    pub fn derived(&self) -> &DerivedParameters {
        &self.derived
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn ext_volume_force(&self) -> bool {
        self.ext_volume_force
    }
}
