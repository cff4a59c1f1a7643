pub mod config;
pub mod run;
pub mod simulate;

use revealgate_core::RevealConfig;

/// Load the stored config and apply a `--seed` override.
pub fn load_config(seed: Option<u64>) -> Result<RevealConfig, Box<dyn std::error::Error>> {
    let mut config = RevealConfig::load()?;
    if seed.is_some() {
        config.seed = seed;
    }
    Ok(config)
}
