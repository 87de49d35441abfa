//! Wire-visible types for the scheduler interface.
//!
//! Grounded on `original_source/devices/flp2epn-zoo/EpnScheduler.h`'s
//! `ScheduleMsg`/`FlpStats`. The source represents the aggregator set as a
//! `std::bitset<O2_MAXIMUM_EPN_ID>`; since `get_aggregator_for` needs an
//! *ordered* round-robin over that set (spec.md §6.5: `(tf_id - tf_min +
//! offset) mod |aggregators|`), the rewrite keeps it as an explicit ordered
//! `Vec<u32>` instead of reproducing the fixed-size bitset.

use serde::{Deserialize, Serialize};

pub type TimeFrameId = u64;
pub type AggregatorId = u32;
pub type ProducerId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMsg {
    pub id: u64,
    pub tf_min: TimeFrameId,
    pub tf_max: TimeFrameId,
    pub aggregators: Vec<AggregatorId>,
}

impl ScheduleMsg {
    pub fn covers(&self, tf_id: TimeFrameId) -> bool {
        tf_id >= self.tf_min && tf_id < self.tf_max
    }

    /// Round-robin lookup within this schedule's range (spec.md §6.5).
    pub fn aggregator_for(&self, tf_id: TimeFrameId) -> Option<AggregatorId> {
        if self.aggregators.is_empty() || !self.covers(tf_id) {
            return None;
        }
        let idx = (tf_id - self.tf_min) as usize % self.aggregators.len();
        Some(self.aggregators[idx])
    }
}

/// The source's `FlpStats`, renamed to match this rewrite's producer/
/// aggregator terminology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProducerStats {
    pub id: ProducerId,
    pub timestamp: u64,
    pub max_tf: TimeFrameId,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorLookup {
    Ok(AggregatorId),
    /// No schedule published yet covering this tf-id.
    Retry,
    /// The current schedule is strictly older than this tf-id.
    Ahead,
}
