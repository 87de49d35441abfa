use clap::Parser;

/// STF Sender (C4): deserializes incoming STFs and dispatches each to the
/// aggregator the scheduler assigns (or a hash fallback).
#[derive(Debug, Parser)]
#[command(name = "stf-sender")]
pub struct Config {
    #[arg(long = "input-channel-name", default_value = "127.0.0.1:9200")]
    pub input_channel_name: String,

    #[arg(long = "output-channel-name", default_value = "127.0.0.1:9400")]
    pub output_channel_name_prefix: String,

    #[arg(long = "epn-count", default_value_t = 1)]
    pub epn_count: u32,

    #[arg(long = "scheduler-url")]
    pub scheduler_url: Option<String>,

    /// How many TFs between liveness/stats publications to the scheduler
    /// (spec.md §4.4's "every K TFs").
    #[arg(long = "stats-period-tf", default_value_t = 50)]
    pub stats_period_tf: u64,

    /// Where aggregator heartbeats (spec.md §4.5) are received.
    #[arg(long = "heartbeat-channel-name", default_value = "127.0.0.1:9500")]
    pub heartbeat_channel_name: String,

    #[arg(long = "producer-id", default_value_t = 0)]
    pub producer_id: u32,
}

impl Config {
    pub fn validate_or_exit(&self) {
        if let Err(e) = dd_utils::config::require_range("epn-count", self.epn_count as u64, 1, 1500) {
            dd_utils::config::fatal(e);
        }
    }

    /// Per-aggregator output address: `prefix` with the aggregator index
    /// appended, since each aggregator gets its own dedicated sender thread
    /// and connection (mirrors `SubTimeFrameSenderOutput.cxx`'s one channel
    /// index per EPN).
    pub fn output_address(&self, aggregator_idx: u32) -> String {
        format!("{}-{aggregator_idx}", self.output_channel_name_prefix)
    }
}
