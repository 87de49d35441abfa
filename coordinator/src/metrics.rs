//! Prometheus counters for the coordinator's request volume, in the same
//! "small set of named counters" style the teacher uses for its own service
//! metrics, rather than per-request histograms this service doesn't need.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

pub static PRODUCER_REGISTRATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dd_coordinator_producer_registrations_total", "Producers registered").unwrap()
});

pub static AGGREGATOR_REGISTRATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dd_coordinator_aggregator_registrations_total", "Aggregators registered").unwrap()
});

pub static SCHEDULES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dd_coordinator_schedules_published_total", "Schedules published, manual or auto-advanced").unwrap()
});

pub static STATS_PUBLISHED: Lazy<IntCounter> =
    Lazy::new(|| register_int_counter!("dd_coordinator_stats_published_total", "Producer stats reports received").unwrap());

pub fn encode() -> Vec<u8> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).expect("text encoding cannot fail");
    buf
}
