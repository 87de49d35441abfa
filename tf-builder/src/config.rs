use std::time::Duration;

use clap::Parser;

/// TF Builder (C5): merges one STF per producer into a TimeFrame per tf-id.
#[derive(Debug, Parser)]
#[command(name = "tf-builder")]
pub struct Config {
    #[arg(long = "input-channel-name", default_value = "127.0.0.1:9400")]
    pub input_channel_name_prefix: String,

    #[arg(long = "flp-count", default_value_t = 1)]
    pub flp_count: u32,

    #[arg(long = "gui", default_value_t = false)]
    pub gui: bool,

    /// Aggregator id this instance advertises in heartbeats.
    #[arg(long = "aggregator-id", default_value_t = 0)]
    pub aggregator_id: u32,

    #[arg(long = "heartbeat-listen", default_value = "127.0.0.1:9500")]
    pub heartbeat_listen: String,

    #[arg(long = "heartbeat-interval-ms", default_value_t = 5000)]
    pub heartbeat_interval_ms: u64,

    /// `T_buffer` (spec.md §4.5): discard an incomplete TF older than this.
    #[arg(long = "buffer-timeout-ms", default_value_t = 1000)]
    pub buffer_timeout_ms: u64,

    /// Timeout-sweep tick period; spec.md §4.5 requires >= 500ms.
    #[arg(long = "sweep-interval-ms", default_value_t = 500)]
    pub sweep_interval_ms: u64,
}

impl Config {
    pub fn validate_or_exit(&self) {
        if let Err(e) = dd_utils::config::require_range("flp-count", self.flp_count as u64, 1, 512) {
            dd_utils::config::fatal(e);
        }
        if self.sweep_interval_ms < 500 {
            dd_utils::config::fatal(dd_utils::ConfigError::OutOfRange {
                name: "sweep-interval-ms",
                value: self.sweep_interval_ms,
                min: 500,
                max: u64::MAX,
            });
        }
    }

    pub fn input_address(&self, flp_idx: u32) -> String {
        format!("{}-{flp_idx}", self.input_channel_name_prefix)
    }

    pub fn buffer_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
