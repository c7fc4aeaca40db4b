use crate::lbm::*;

/// Log mass, momentum and average density of the fluid in MD units
pub fn log_fluid_summary(lbm: &Lbm) {
    let j = lbm.total_momentum();
    log::info!(
        "t = {}: mass {:.6}, momentum ({:.3e}, {:.3e}, {:.3e}), average density {:.6}",
        lbm.get_time_step(),
        lbm.total_mass(),
        j[0], j[1], j[2],
        lbm.average_density()
    );
}

/// Log the largest and the summed force on local particles
pub fn log_particle_forces(cells: &[ParticleCells]) {
    let mut sum = [0.0; 3];
    let mut max: f64 = 0.0;
    for p in cells.iter().flat_map(|c| c.local.iter()) {
        for a in 0..3 {
            sum[a] += p.f[a];
        }
        max = max.max((p.f[0] * p.f[0] + p.f[1] * p.f[1] + p.f[2] * p.f[2]).sqrt());
    }
    log::info!("Max particle force: {:.4e}, sum: {:?}", max, sum);
}
