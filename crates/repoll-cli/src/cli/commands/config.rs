//! `repoll config` – show where the config lives and what it resolves to.

use anyhow::Result;
use repoll_core::config::{self, RepollConfig};

pub fn run_config(cfg: &RepollConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
