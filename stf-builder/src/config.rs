use clap::Parser;
use dd_utils::config::{fatal, require_power_of_two, require_range};

/// STF Builder (C3): groups readout fragments into per-tf-id SubTimeFrames.
///
/// Option names match spec.md §6.4 verbatim since external launch scripts
/// depend on them.
#[derive(Debug, Parser)]
#[command(name = "stf-builder")]
pub struct Config {
    #[arg(long = "input-channel-name", default_value = "127.0.0.1:9100")]
    pub input_channel_name: String,

    #[arg(long = "output-channel-name", default_value = "127.0.0.1:9200")]
    pub output_channel_name: String,

    #[arg(long = "cru-count", default_value_t = 1)]
    pub cru_count: u32,

    #[arg(long = "gui", default_value_t = false)]
    pub gui: bool,

    #[arg(long = "data-shm-region-size", default_value_t = 4 * 1024 * 1024)]
    pub data_shm_region_size: u64,

    #[arg(long = "desc-shm-region-size", default_value_t = 256 * 1024)]
    pub desc_shm_region_size: u64,

    #[arg(long = "cru-superpage-size", default_value_t = 1024 * 1024)]
    pub cru_superpage_size: u64,

    #[arg(long = "free-shm-channel-name", default_value = "127.0.0.1:9300")]
    pub free_shm_channel_name: String,

    #[arg(long = "subbuffer-size", default_value_t = 8 * 1024)]
    pub subbuffer_size: u64,
}

impl Config {
    /// Validates the numeric options per spec.md §6.4/§7.1. Exits non-zero
    /// on failure rather than returning, matching the source's
    /// "misconfiguration is fatal at init" contract.
    pub fn validate_or_exit(&self) {
        if let Err(e) = require_power_of_two("cru-superpage-size", self.cru_superpage_size) {
            fatal(e);
        }
        if let Err(e) = require_range("cru-count", self.cru_count as u64, 1, 32) {
            fatal(e);
        }
    }

    pub fn arena_config(&self) -> dd_arena::ArenaConfig {
        dd_arena::ArenaConfig {
            data_region_size: self.data_shm_region_size as usize,
            desc_region_size: self.desc_shm_region_size as usize,
            superpage_size: self.cru_superpage_size as usize,
            subbuffer_size: self.subbuffer_size as usize,
        }
    }
}
