//! The scheduler client interface (spec.md §6.5) and two implementations:
//! an in-memory one used both for tests and as `dd-coordinator`'s own master
//! state, and an HTTP/JSON one producers and aggregators use to reach a
//! remote `dd-coordinator`.
//!
//! The teacher's `storage_broker` talks to its `safekeeper` peers over a
//! typed RPC client; this plays the same client/reference-service role but
//! over JSON rather than protobuf/tonic, since no `.proto` toolchain is
//! otherwise introduced into this workspace (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::SchedulerError;
use crate::types::{AggregatorId, AggregatorLookup, ProducerId, ProducerStats, ScheduleMsg, TimeFrameId};

pub trait SchedulerClient: Send + Sync {
    fn register_producer(&self, id: ProducerId) -> Result<(), SchedulerError>;
    fn register_aggregator(&self, id: AggregatorId) -> Result<(), SchedulerError>;
    fn get_available_aggregators(&self) -> Result<Vec<AggregatorId>, SchedulerError>;
    fn publish_schedule(&self, msg: ScheduleMsg) -> Result<(), SchedulerError>;
    fn get_aggregator_for(&self, tf_id: TimeFrameId) -> Result<AggregatorLookup, SchedulerError>;
    fn publish_stats(&self, stats: ProducerStats) -> Result<(), SchedulerError>;
    fn fetch_stats(&self) -> Result<Vec<ProducerStats>, SchedulerError>;
}

#[derive(Default)]
struct MasterState {
    producers: HashMap<ProducerId, ()>,
    aggregators: HashMap<AggregatorId, ()>,
    schedule: Option<ScheduleMsg>,
    stats: HashMap<ProducerId, ProducerStats>,
}

/// Single-process scheduler state. Used directly by tests and by
/// `dd-coordinator`'s HTTP handlers; also usable in-process when a core
/// binary is run without a separate coordinator (fallback routing still
/// takes priority in C4 per spec.md §4.4, this is only exercised when a
/// caller explicitly wires it in).
#[derive(Default)]
pub struct InMemorySchedulerClient {
    state: Mutex<MasterState>,
}

impl InMemorySchedulerClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulerClient for InMemorySchedulerClient {
    fn register_producer(&self, id: ProducerId) -> Result<(), SchedulerError> {
        self.state.lock().unwrap().producers.insert(id, ());
        Ok(())
    }

    fn register_aggregator(&self, id: AggregatorId) -> Result<(), SchedulerError> {
        self.state.lock().unwrap().aggregators.insert(id, ());
        Ok(())
    }

    fn get_available_aggregators(&self) -> Result<Vec<AggregatorId>, SchedulerError> {
        Ok(self.state.lock().unwrap().aggregators.keys().copied().collect())
    }

    fn publish_schedule(&self, msg: ScheduleMsg) -> Result<(), SchedulerError> {
        self.state.lock().unwrap().schedule = Some(msg);
        Ok(())
    }

    fn get_aggregator_for(&self, tf_id: TimeFrameId) -> Result<AggregatorLookup, SchedulerError> {
        let state = self.state.lock().unwrap();
        Ok(match &state.schedule {
            None => AggregatorLookup::Retry,
            Some(sched) if tf_id < sched.tf_min => AggregatorLookup::Ahead,
            Some(sched) if tf_id >= sched.tf_max => AggregatorLookup::Retry,
            Some(sched) => match sched.aggregator_for(tf_id) {
                Some(id) => AggregatorLookup::Ok(id),
                None => AggregatorLookup::Retry,
            },
        })
    }

    fn publish_stats(&self, stats: ProducerStats) -> Result<(), SchedulerError> {
        self.state.lock().unwrap().stats.insert(stats.id, stats);
        Ok(())
    }

    fn fetch_stats(&self) -> Result<Vec<ProducerStats>, SchedulerError> {
        Ok(self.state.lock().unwrap().stats.values().copied().collect())
    }
}

/// HTTP/JSON client for a remote `dd-coordinator`. Uses `reqwest::blocking`
/// so that C4/C5's synchronous worker threads can call it directly without
/// pulling a tokio runtime into their hot path (spec.md §5's concurrency
/// model keeps the core on `std::thread`).
pub struct HttpSchedulerClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpSchedulerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builder with static config cannot fail");
        HttpSchedulerClient {
            base_url: base_url.into(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl SchedulerClient for HttpSchedulerClient {
    fn register_producer(&self, id: ProducerId) -> Result<(), SchedulerError> {
        self.http
            .post(self.url(&format!("/producers/{id}")))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn register_aggregator(&self, id: AggregatorId) -> Result<(), SchedulerError> {
        self.http
            .post(self.url(&format!("/aggregators/{id}")))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get_available_aggregators(&self) -> Result<Vec<AggregatorId>, SchedulerError> {
        let resp = self.http.get(self.url("/aggregators")).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    fn publish_schedule(&self, msg: ScheduleMsg) -> Result<(), SchedulerError> {
        self.http
            .post(self.url("/schedule"))
            .json(&msg)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get_aggregator_for(&self, tf_id: TimeFrameId) -> Result<AggregatorLookup, SchedulerError> {
        #[derive(serde::Deserialize)]
        #[serde(tag = "kind", content = "aggregator_id")]
        enum Wire {
            Ok(AggregatorId),
            Retry,
            Ahead,
        }

        let resp = self
            .http
            .get(self.url(&format!("/schedule/{tf_id}")))
            .send()?
            .error_for_status()?;
        let wire: Wire = resp.json()?;
        Ok(match wire {
            Wire::Ok(id) => AggregatorLookup::Ok(id),
            Wire::Retry => AggregatorLookup::Retry,
            Wire::Ahead => AggregatorLookup::Ahead,
        })
    }

    fn publish_stats(&self, stats: ProducerStats) -> Result<(), SchedulerError> {
        self.http
            .post(self.url("/stats"))
            .json(&stats)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn fetch_stats(&self) -> Result<Vec<ProducerStats>, SchedulerError> {
        let resp = self.http.get(self.url("/stats")).send()?.error_for_status()?;
        Ok(resp.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_retry_before_any_schedule() {
        let client = InMemorySchedulerClient::new();
        assert_eq!(client.get_aggregator_for(0).unwrap(), AggregatorLookup::Retry);
    }

    #[test]
    fn schedule_wrap_round_robins_then_retries_past_tf_max() {
        let client = InMemorySchedulerClient::new();
        client
            .publish_schedule(ScheduleMsg {
                id: 1,
                tf_min: 0,
                tf_max: 100,
                aggregators: vec![0, 1, 2],
            })
            .unwrap();

        for tf in 0..6u64 {
            assert_eq!(
                client.get_aggregator_for(tf).unwrap(),
                AggregatorLookup::Ok((tf % 3) as AggregatorId)
            );
        }
        assert_eq!(client.get_aggregator_for(100).unwrap(), AggregatorLookup::Retry);
    }

    #[test]
    fn tf_before_schedule_min_is_ahead() {
        let client = InMemorySchedulerClient::new();
        client
            .publish_schedule(ScheduleMsg {
                id: 2,
                tf_min: 50,
                tf_max: 100,
                aggregators: vec![0, 1],
            })
            .unwrap();
        assert_eq!(client.get_aggregator_for(10).unwrap(), AggregatorLookup::Ahead);
    }
}
