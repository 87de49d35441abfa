//! Client interface to the TF scheduler, an external collaborator
//! (spec.md §6.5) that maps tf-ids to aggregators and tracks liveness.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpSchedulerClient, InMemorySchedulerClient, SchedulerClient};
pub use error::SchedulerError;
pub use types::{AggregatorId, AggregatorLookup, ProducerId, ProducerStats, ScheduleMsg, TimeFrameId};
