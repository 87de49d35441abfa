//! Master scheduling state: wraps [`InMemorySchedulerClient`] with the
//! auto-advance behaviour `EpnScheduler`'s master performs manually
//! (`updateSchedule`/`getEpnIdFromTimeframeId` in
//! `devices/flp2epn-zoo/EpnScheduler.cxx`) — when a query runs past the
//! published window and aggregators are available, publish the next window
//! automatically instead of requiring an external operator to call
//! `publish_schedule`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dd_scheduler_api::{
    AggregatorId, AggregatorLookup, InMemorySchedulerClient, ProducerId, ProducerStats, ScheduleMsg, SchedulerClient,
    SchedulerError, TimeFrameId,
};

pub struct Coordinator {
    client: InMemorySchedulerClient,
    window: TimeFrameId,
    next_schedule_id: AtomicU64,
    advance_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new(window: TimeFrameId) -> Self {
        Coordinator {
            client: InMemorySchedulerClient::new(),
            window,
            next_schedule_id: AtomicU64::new(1),
            advance_lock: Mutex::new(()),
        }
    }

    pub fn register_producer(&self, id: ProducerId) -> Result<(), SchedulerError> {
        self.client.register_producer(id)
    }

    pub fn register_aggregator(&self, id: AggregatorId) -> Result<(), SchedulerError> {
        self.client.register_aggregator(id)
    }

    pub fn available_aggregators(&self) -> Result<Vec<AggregatorId>, SchedulerError> {
        self.client.get_available_aggregators()
    }

    pub fn publish_schedule(&self, msg: ScheduleMsg) -> Result<(), SchedulerError> {
        self.client.publish_schedule(msg)
    }

    pub fn publish_stats(&self, stats: ProducerStats) -> Result<(), SchedulerError> {
        self.client.publish_stats(stats)
    }

    pub fn fetch_stats(&self) -> Result<Vec<ProducerStats>, SchedulerError> {
        self.client.fetch_stats()
    }

    /// Resolves a tf-id, auto-publishing the next schedule window when the
    /// lookup would otherwise be `Retry` and at least one aggregator is
    /// registered.
    pub fn resolve(&self, tf_id: TimeFrameId) -> Result<AggregatorLookup, SchedulerError> {
        let lookup = self.client.get_aggregator_for(tf_id)?;
        if !matches!(lookup, AggregatorLookup::Retry) {
            return Ok(lookup);
        }

        let mut aggregators = self.client.get_available_aggregators()?;
        if aggregators.is_empty() {
            return Ok(AggregatorLookup::Retry);
        }
        aggregators.sort_unstable();

        let _guard = self.advance_lock.lock().unwrap();
        // Re-check: another thread may have advanced the schedule already.
        let lookup = self.client.get_aggregator_for(tf_id)?;
        if !matches!(lookup, AggregatorLookup::Retry) {
            return Ok(lookup);
        }

        let id = self.next_schedule_id.fetch_add(1, Ordering::Relaxed);
        let tf_min = tf_id;
        let tf_max = tf_id + self.window;
        tracing::info!(id, tf_min, tf_max, aggregators = ?aggregators, "auto-advancing schedule");
        self.client.publish_schedule(ScheduleMsg {
            id,
            tf_min,
            tf_max,
            aggregators,
        })?;

        self.client.get_aggregator_for(tf_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_advances_past_tf_max_when_aggregators_registered() {
        let coordinator = Coordinator::new(10);
        coordinator.register_aggregator(0).unwrap();
        coordinator.register_aggregator(1).unwrap();

        assert_eq!(coordinator.resolve(0).unwrap(), AggregatorLookup::Ok(0));
        assert_eq!(coordinator.resolve(1).unwrap(), AggregatorLookup::Ok(1));
    }

    #[test]
    fn stays_retry_with_no_registered_aggregators() {
        let coordinator = Coordinator::new(10);
        assert_eq!(coordinator.resolve(0).unwrap(), AggregatorLookup::Retry);
    }

    #[test]
    fn second_window_starts_where_the_query_landed() {
        let coordinator = Coordinator::new(5);
        coordinator.register_aggregator(0).unwrap();
        assert_eq!(coordinator.resolve(0).unwrap(), AggregatorLookup::Ok(0));
        assert_eq!(coordinator.resolve(5).unwrap(), AggregatorLookup::Ok(0));
    }
}
