//! Aggregator routing decisions (spec.md §4.4).
//!
//! With a scheduler configured, each tf-id is looked up through
//! [`dd_scheduler_api::SchedulerClient`]; heartbeat liveness (spec.md §4.5's
//! heartbeat thread, consumed here) can still veto a `Ok` answer if the
//! chosen aggregator has gone quiet. Without a scheduler the sender falls
//! back to `tf_id mod N`, matching the plain modulo placement
//! `devices/flp2epn-distributed/FLPSender.cxx` uses when no EpnScheduler is
//! configured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dd_scheduler_api::{AggregatorId, AggregatorLookup, SchedulerClient, TimeFrameId};
use prometheus::IntCounter;

pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Send(AggregatorId),
    /// Scheduler has no schedule covering this tf-id yet; caller should
    /// publish stats and retry with backoff.
    Retry,
    /// Schedule is newer than this tf-id; drop and count.
    Ahead,
    /// Scheduler picked an aggregator whose heartbeat has gone stale.
    DeadPeer(AggregatorId),
}

pub struct Router {
    scheduler: Option<Arc<dyn SchedulerClient>>,
    epn_count: u32,
    heartbeat_timeout: Duration,
    last_heartbeat: Mutex<HashMap<AggregatorId, Instant>>,
    /// §7.3 ambient metrics: not wired to an HTTP exporter in this binary,
    /// just periodically logged (see `main::run_deserializer`).
    pub dropped_ahead: IntCounter,
    pub dropped_dead_peer: IntCounter,
}

impl Router {
    pub fn new(scheduler: Option<Arc<dyn SchedulerClient>>, epn_count: u32) -> Self {
        Router {
            scheduler,
            epn_count,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            last_heartbeat: Mutex::new(HashMap::new()),
            dropped_ahead: IntCounter::new("dd_stf_sender_dropped_ahead_total", "STFs dropped: scheduler is ahead")
                .expect("static metric name/help are valid"),
            dropped_dead_peer: IntCounter::new(
                "dd_stf_sender_dropped_dead_peer_total",
                "STFs dropped: routed aggregator's heartbeat is stale",
            )
            .expect("static metric name/help are valid"),
        }
    }

    pub fn record_heartbeat(&self, aggregator_id: AggregatorId) {
        self.last_heartbeat.lock().unwrap().insert(aggregator_id, Instant::now());
    }

    fn is_alive(&self, aggregator_id: AggregatorId) -> bool {
        match self.last_heartbeat.lock().unwrap().get(&aggregator_id) {
            Some(last) => last.elapsed() <= self.heartbeat_timeout,
            // no heartbeat observed yet: assume alive until proven otherwise
            None => true,
        }
    }

    pub fn route(&self, tf_id: TimeFrameId) -> RouteOutcome {
        let Some(scheduler) = &self.scheduler else {
            return RouteOutcome::Send((tf_id % self.epn_count as u64) as AggregatorId);
        };

        match scheduler.get_aggregator_for(tf_id) {
            Ok(AggregatorLookup::Ok(id)) => {
                if self.is_alive(id) {
                    RouteOutcome::Send(id)
                } else {
                    self.dropped_dead_peer.inc();
                    RouteOutcome::DeadPeer(id)
                }
            }
            Ok(AggregatorLookup::Retry) => RouteOutcome::Retry,
            Ok(AggregatorLookup::Ahead) => {
                self.dropped_ahead.inc();
                RouteOutcome::Ahead
            }
            Err(e) => {
                tracing::warn!(error = %e, tf_id, "scheduler lookup failed, retrying");
                RouteOutcome::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_scheduler_api::{InMemorySchedulerClient, ScheduleMsg};

    #[test]
    fn falls_back_to_modulo_without_scheduler() {
        let router = Router::new(None, 3);
        assert_eq!(router.route(0), RouteOutcome::Send(0));
        assert_eq!(router.route(4), RouteOutcome::Send(1));
        assert_eq!(router.route(5), RouteOutcome::Send(2));
    }

    #[test]
    fn routes_via_scheduler_schedule() {
        let scheduler: Arc<dyn SchedulerClient> = Arc::new(InMemorySchedulerClient::new());
        scheduler
            .publish_schedule(ScheduleMsg {
                id: 1,
                tf_min: 0,
                tf_max: 10,
                aggregators: vec![0, 1],
            })
            .unwrap();
        let router = Router::new(Some(scheduler), 2);
        assert_eq!(router.route(0), RouteOutcome::Send(0));
        assert_eq!(router.route(1), RouteOutcome::Send(1));
        assert_eq!(router.route(20), RouteOutcome::Retry);
    }

    #[test]
    fn dead_heartbeat_vetoes_scheduler_answer() {
        let scheduler: Arc<dyn SchedulerClient> = Arc::new(InMemorySchedulerClient::new());
        scheduler
            .publish_schedule(ScheduleMsg {
                id: 1,
                tf_min: 0,
                tf_max: 10,
                aggregators: vec![1],
            })
            .unwrap();
        let router = Router::new(Some(scheduler), 1);
        router.heartbeat_timeout_override_for_test();
        assert_eq!(router.route(0), RouteOutcome::DeadPeer(1));
    }

    impl Router {
        fn heartbeat_timeout_override_for_test(&self) {
            self.last_heartbeat
                .lock()
                .unwrap()
                .insert(1, Instant::now() - Duration::from_secs(3600));
        }
    }
}
