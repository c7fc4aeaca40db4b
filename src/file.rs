//! Reading and writing `LbmConfig` as JSON.

use std::path::Path;

use crate::lbm::{LbResult, LbmConfig};

pub fn read_config<P: AsRef<Path> + std::fmt::Display>(path: P) -> LbResult<LbmConfig> {
    log::info!("Reading simulation config from \"{}\"", path);
    let buffer = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&buffer)?)
}

pub fn write_config<P: AsRef<Path> + std::fmt::Display>(config: &LbmConfig, path: P) -> LbResult<()> {
    log::info!("Writing simulation config to \"{}\"", path);
    let buffer = serde_json::to_string_pretty(config)?;
    std::fs::write(path, buffer)?;
    Ok(())
}
