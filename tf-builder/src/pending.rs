//! Pending-TF bookkeeping and the merge trigger (spec.md §4.5).
//!
//! Grounded directly on `TimeFrameBuilderInput.cxx`'s `StfMergerThread`: a
//! `multimap<tf_id, SubTimeFrame>` keyed by tf-id, merged either when a
//! second tf-id shows up (the earlier one is implicitly complete-or-late) or
//! when the earliest tf-id's count reaches `N`. The source's
//! `std::multimap` is modeled here as `BTreeMap<TimeFrameIdType,
//! Vec<SubTimeFrame>>`, since ordering is only needed across keys, not
//! within one key's bucket.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use dd_stf::{SubTimeFrame, TimeFrame, TimeFrameIdType};
use prometheus::IntCounter;

struct State {
    pending: BTreeMap<TimeFrameIdType, Vec<SubTimeFrame>>,
    start_time: BTreeMap<TimeFrameIdType, Instant>,
    discarded: HashSet<TimeFrameIdType>,
}

pub struct PendingTfs {
    producer_count: usize,
    buffer_timeout: Duration,
    state: Mutex<State>,
    condvar: Condvar,
    /// §7.3 ambient metrics: logged periodically by the sweep thread, not
    /// wired to an HTTP exporter in this binary.
    pub discarded_count: IntCounter,
    pub rejected_late_count: IntCounter,
}

/// Outcome of a single merger step; `Merged` carries the finished TF plus
/// whether it was complete (all `N` producers present).
pub enum MergeStep {
    Merged { tf: TimeFrame, complete: bool },
    Idle,
}

impl PendingTfs {
    pub fn new(producer_count: usize, buffer_timeout: Duration) -> Self {
        PendingTfs {
            producer_count,
            buffer_timeout,
            state: Mutex::new(State {
                pending: BTreeMap::new(),
                start_time: BTreeMap::new(),
                discarded: HashSet::new(),
            }),
            condvar: Condvar::new(),
            discarded_count: IntCounter::new("dd_tf_builder_discarded_total", "TFs discarded after buffer timeout")
                .expect("static metric name/help are valid"),
            rejected_late_count: IntCounter::new(
                "dd_tf_builder_rejected_late_total",
                "STFs rejected for an already-discarded tf-id",
            )
            .expect("static metric name/help are valid"),
        }
    }

    /// Inserts one producer's STF for its tf-id. Rejects (and counts) STFs
    /// for a tf-id already timed out, per spec.md §4.5's "reject subsequent
    /// arrivals for a discarded tf-id with a warning".
    pub fn insert(&self, stf: SubTimeFrame) {
        let tf_id = stf.tf_id();
        let mut state = self.state.lock().unwrap();

        if state.discarded.contains(&tf_id) {
            self.rejected_late_count.inc();
            tracing::warn!(tf_id, "rejecting STF for already-discarded tf-id");
            return;
        }

        state.start_time.entry(tf_id).or_insert_with(Instant::now);
        state.pending.entry(tf_id).or_default().push(stf);

        let should_signal = state.pending.len() > 1
            || state
                .pending
                .iter()
                .next()
                .map(|(_, v)| v.len() >= self.producer_count)
                .unwrap_or(false);
        drop(state);
        if should_signal {
            self.condvar.notify_one();
        }
    }

    /// One merger-thread iteration: waits up to `timeout` for a signal (the
    /// >= 500ms tick spec.md §4.5 requires so sweeps run even when idle),
    /// then merges the earliest tf-id's group if it is ready.
    pub fn merge_step(&self, wait_timeout: Duration) -> MergeStep {
        let state = self.state.lock().unwrap();
        let (state, timed_out) = self
            .condvar
            .wait_timeout_while(state, wait_timeout, |s| {
                s.pending.is_empty()
                    || !(s.pending.len() > 1 || s.pending.values().next().map_or(false, |v| v.len() >= self.producer_count))
            })
            .unwrap();
        let (state, was_timeout) = (state, timed_out.timed_out());
        self.try_merge_ready(state, was_timeout)
    }

    fn try_merge_ready<'a>(&self, mut state: std::sync::MutexGuard<'a, State>, timed_out: bool) -> MergeStep {
        if timed_out || state.pending.is_empty() {
            return MergeStep::Idle;
        }

        let earliest = *state.pending.keys().next().unwrap();
        let group_ready = state.pending.len() > 1
            || state.pending.get(&earliest).map_or(false, |v| v.len() >= self.producer_count);
        if !group_ready {
            return MergeStep::Idle;
        }

        let mut stfs = state.pending.remove(&earliest).unwrap();
        state.start_time.remove(&earliest);
        drop(state);

        let complete = stfs.len() >= self.producer_count;
        if !complete {
            tracing::warn!(
                tf_id = earliest,
                collected = stfs.len(),
                expected = self.producer_count,
                "merging incomplete TF"
            );
        }

        let mut iter = stfs.drain(..);
        let mut tf = iter.next().expect("group_ready implies at least one STF");
        for next in iter {
            tf.merge(next);
        }
        MergeStep::Merged { tf, complete }
    }

    /// Evicts any pending tf-id whose oldest STF has been waiting longer
    /// than `buffer_timeout`, marking it `discarded` so late arrivals are
    /// rejected rather than silently re-admitted.
    pub fn sweep_timeouts(&self) {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<TimeFrameIdType> = state
            .start_time
            .iter()
            .filter(|(_, started)| now.duration_since(**started) > self.buffer_timeout)
            .map(|(tf_id, _)| *tf_id)
            .collect();

        for tf_id in expired {
            state.pending.remove(&tf_id);
            state.start_time.remove(&tf_id);
            state.discarded.insert(tf_id);
            self.discarded_count.inc();
            tracing::warn!(tf_id, "discarding incomplete TF after buffer timeout");
        }
    }

    #[cfg(test)]
    fn pending_count(&self, tf_id: TimeFrameIdType) -> usize {
        self.state.lock().unwrap().pending.get(&tf_id).map_or(0, Vec::len)
    }

    #[cfg(test)]
    fn is_discarded(&self, tf_id: TimeFrameIdType) -> bool {
        self.state.lock().unwrap().discarded.contains(&tf_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_stf::EquipmentIdentifier;
    use dd_utils::PayloadHandle;

    fn stf(tf_id: u64, sub_spec: u64) -> SubTimeFrame {
        let mut s = SubTimeFrame::new(tf_id);
        s.add_hbframes(
            EquipmentIdentifier::new([1; 16], *b"TPC\0", sub_spec),
            vec![PayloadHandle::from_bytes(vec![1])],
        );
        s
    }

    #[test]
    fn merges_on_count_reaching_n() {
        let pending = PendingTfs::new(3, Duration::from_secs(1));
        pending.insert(stf(42, 0));
        pending.insert(stf(42, 1));
        assert_eq!(pending.pending_count(42), 2);
        pending.insert(stf(42, 2));

        match pending.merge_step(Duration::from_millis(10)) {
            MergeStep::Merged { tf, complete } => {
                assert_eq!(tf.tf_id(), 42);
                assert_eq!(tf.eq_count(), 3);
                assert!(complete);
            }
            MergeStep::Idle => panic!("expected a merge"),
        }
    }

    #[test]
    fn merges_incomplete_group_when_a_newer_tf_id_arrives() {
        let pending = PendingTfs::new(3, Duration::from_secs(1));
        pending.insert(stf(1, 0));
        pending.insert(stf(1, 1));
        pending.insert(stf(2, 0));

        match pending.merge_step(Duration::from_millis(10)) {
            MergeStep::Merged { tf, complete } => {
                assert_eq!(tf.tf_id(), 1);
                assert_eq!(tf.eq_count(), 2);
                assert!(!complete);
            }
            MergeStep::Idle => panic!("expected a merge of the earlier, incomplete group"),
        }
    }

    #[test]
    fn timeout_sweep_discards_and_rejects_late_arrivals() {
        let pending = PendingTfs::new(3, Duration::from_millis(10));
        pending.insert(stf(99, 0));
        pending.insert(stf(99, 1));
        std::thread::sleep(Duration::from_millis(20));
        pending.sweep_timeouts();

        assert!(pending.is_discarded(99));
        assert_eq!(pending.discarded_count.get(), 1);

        pending.insert(stf(99, 2));
        assert_eq!(pending.rejected_late_count.get(), 1);
        assert_eq!(pending.pending_count(99), 0);
    }

    #[test]
    fn idle_wait_times_out_without_merging() {
        let pending = PendingTfs::new(3, Duration::from_secs(1));
        pending.insert(stf(1, 0));
        match pending.merge_step(Duration::from_millis(10)) {
            MergeStep::Idle => {}
            MergeStep::Merged { .. } => panic!("single STF for N=3 should not merge yet"),
        }
    }
}
