use lbsolver::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config_path = std::env::args().nth(1);

    #[cfg(feature = "multi-node")]
    lbm::multi_node::run_node(config_path.as_deref());

    #[cfg(not(feature = "multi-node"))]
    if let Err(e) = run(config_path.as_deref()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Run the demo suspension in a single process
#[cfg(not(feature = "multi-node"))]
fn run(config_path: Option<&str>) -> lbm::LbResult<()> {
    log::info!("lbsolver - fluctuating lattice Boltzmann\n");
    let config = match config_path {
        Some(path) => file::read_config(path)?,
        None => setup::demo_config(),
    };
    let mut lbm = Lbm::new(config)?;
    lbm.initialize();
    let mut particles = setup::demo_particles(lbm.config());
    debug::log_fluid_summary(&lbm);

    let dt = lbm.ctx().time_step();
    let md_steps = (lbm.config().run_steps as f64 * lbm.ctx().params().tau / dt).round() as u64;
    for step in 0..md_steps {
        let mut cells = lbm.decompose_particles(&particles);
        lbm.couple_particles(&mut cells)?;
        lbm.advance(dt);
        setup::drag_particles(&mut particles, dt);
        if step % 100 == 0 {
            debug::log_particle_forces(&cells);
            debug::log_fluid_summary(&lbm);
        }
    }
    debug::log_fluid_summary(&lbm);
    log::info!("Finished {} LB steps: {:?}", lbm.get_time_step(), lbm.diagnostics());
    Ok(())
}
