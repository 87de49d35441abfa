use clap::Parser;

/// `dd-coordinator`: the scheduler external collaborator (spec.md §6.5),
/// exposed as a small HTTP/JSON service.
#[derive(Debug, Parser)]
#[command(name = "dd-coordinator")]
pub struct Config {
    #[arg(long = "listen", default_value = "127.0.0.1:9600")]
    pub listen: String,

    /// Width, in tf-ids, of each auto-published schedule window.
    #[arg(long = "schedule-window", default_value_t = 100)]
    pub schedule_window: u64,
}

impl Config {
    pub fn validate_or_exit(&self) {
        if let Err(e) = dd_utils::config::require_range("schedule-window", self.schedule_window, 1, 1_000_000) {
            dd_utils::config::fatal(e);
        }
    }
}
