use crate::lbm::*;

/// `demo_config()` is used when no configuration file is given. Edit this function to change simulation parameters.
///
/// Usage:
///
/// Start by requesting a new `LbmConfig` with `LbmConfig::new()`.
/// You can then set individual arguments by setting fields of the `LbmConfig`. Fluid parameters are given in MD units
/// in `config.params`, the lattice quantities are derived from them.
///
/// After setting your config struct, request a new `Lbm` struct with `Lbm::new(your_lbm_config)`.
/// Domain setup is handled automatically, you might now directly set specific nodes with `set_node_velocity()`.
pub fn demo_config() -> LbmConfig {
    let mut lbm_config = LbmConfig::new();
    lbm_config.n_x = 32;
    lbm_config.n_y = 32;
    lbm_config.n_z = 32;
    lbm_config.d_x = 2;
    lbm_config.time_step = 0.01;
    lbm_config.params = PhysicalParameters {
        agrid: 1.0,
        tau: 0.05,
        density: 1.0,
        viscosity: 3.0,
        bulk_viscosity: 3.0,
        friction: 5.0,
        temperature: 0.1,
        ext_force: [0.0; 3],
    };
    lbm_config.seed = 42;
    lbm_config.run_steps = 1000;
    lbm_config
}

/// A layer of particles dragged through the fluid along x.
pub fn demo_particles(lbm_config: &LbmConfig) -> Vec<Particle> {
    let box_l = lbm_config.box_l();
    let mut particles = Vec::new();
    let n = 8;
    for i in 0..n {
        for j in 0..n {
            let pos = [
                (i as f64 + 0.5) * box_l[0] / n as f64,
                (j as f64 + 0.5) * box_l[1] / n as f64,
                0.5 * box_l[2],
            ];
            particles.push(Particle::new((i * n + j) as u64, pos, [0.1, 0.0, 0.0]));
        }
    }
    particles
}

/// Move particles with their constant velocity. Forces are reset for the next coupling step.
pub fn drag_particles(particles: &mut [Particle], dt: f64) {
    for p in particles.iter_mut() {
        for a in 0..3 {
            p.pos[a] += p.v[a] * dt;
        }
        p.f = [0.0; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_configuration_is_valid() {
        let lbm = Lbm::new(demo_config()).unwrap();
        assert_eq!(lbm.get_d_n(), 2);
        assert!(lbm.ctx().derived().fluct);
    }

    #[test]
    fn demo_particles_are_inside_the_box() {
        let cfg = demo_config();
        let box_l = cfg.box_l();
        let particles = demo_particles(&cfg);
        assert_eq!(particles.len(), 64);
        assert!(particles.iter().all(|p| (0..3).all(|a| p.pos[a] >= 0.0 && p.pos[a] < box_l[a])));
    }
}
