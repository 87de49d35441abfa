//! Per-input-channel state machine (spec.md §4.3).
//!
//! Grounded on `original_source/.../SubTimeFrameBuilderInput.cxx`: each
//! readout channel feeds a stream of `(ReadoutSubTimeframeHeader, HBF
//! payloads)` messages; consecutive messages sharing one tf-id accumulate
//! into one STF, which is handed off the moment a different tf-id shows up.

use dd_stf::{EquipmentIdentifier, ReadoutSubTimeframeHeader, SubTimeFrame};
use dd_utils::PayloadHandle;

enum State {
    Idle,
    Collecting { tf_id: u64, stf: SubTimeFrame },
}

/// One readout channel's equipment identity is fixed at construction; only
/// `sub_specification` varies per message, carried as `link_id` in the
/// ingress header.
pub struct InputChannel {
    data_description: [u8; 16],
    data_origin: [u8; 4],
    state: State,
    pub tf_regressions: u64,
}

impl InputChannel {
    pub fn new(data_description: [u8; 16], data_origin: [u8; 4]) -> Self {
        InputChannel {
            data_description,
            data_origin,
            state: State::Idle,
            tf_regressions: 0,
        }
    }

    fn identifier_for(&self, link_id: u8) -> EquipmentIdentifier {
        EquipmentIdentifier::new(self.data_description, self.data_origin, link_id as u64)
    }

    /// Feeds one readout message into the state machine. Returns a finalized
    /// STF when the arriving tf-id differs from the one currently being
    /// collected (spec.md §4.3's second and third bullets).
    pub fn ingest(
        &mut self,
        header: ReadoutSubTimeframeHeader,
        payloads: Vec<PayloadHandle>,
    ) -> Option<SubTimeFrame> {
        let identifier = self.identifier_for(header.link_id);

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                let mut stf = SubTimeFrame::new(header.tf_id);
                stf.add_hbframes(identifier, payloads);
                self.state = State::Collecting {
                    tf_id: header.tf_id,
                    stf,
                };
                None
            }
            State::Collecting { tf_id, mut stf } if tf_id == header.tf_id => {
                stf.add_hbframes(identifier, payloads);
                self.state = State::Collecting { tf_id, stf };
                None
            }
            State::Collecting { tf_id, stf } => {
                if header.tf_id < tf_id {
                    self.tf_regressions += 1;
                    tracing::warn!(
                        previous_tf_id = tf_id,
                        new_tf_id = header.tf_id,
                        "tf_id decreased; continuing as a new STF"
                    );
                }
                let mut new_stf = SubTimeFrame::new(header.tf_id);
                new_stf.add_hbframes(identifier, payloads);
                self.state = State::Collecting {
                    tf_id: header.tf_id,
                    stf: new_stf,
                };
                Some(stf)
            }
        }
    }

    /// Flushes whatever is currently being collected, e.g. on shutdown.
    pub fn finish(&mut self) -> Option<SubTimeFrame> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => None,
            State::Collecting { stf, .. } => Some(stf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdr(tf_id: u64, link_id: u8) -> ReadoutSubTimeframeHeader {
        ReadoutSubTimeframeHeader {
            tf_id: tf_id as u32,
            hbframe_count: 1,
            link_id,
        }
    }

    #[test]
    fn consecutive_same_tf_id_accumulates() {
        let mut chan = InputChannel::new([1; 16], *b"TPC\0");
        assert!(chan.ingest(hdr(1, 0), vec![PayloadHandle::from_bytes(vec![1])]).is_none());
        assert!(chan.ingest(hdr(1, 1), vec![PayloadHandle::from_bytes(vec![2])]).is_none());
        let stf = chan.finish().unwrap();
        assert_eq!(stf.eq_count(), 2);
    }

    #[test]
    fn tf_id_change_finalizes_previous_stf() {
        let mut chan = InputChannel::new([1; 16], *b"TPC\0");
        assert!(chan.ingest(hdr(1, 0), vec![PayloadHandle::from_bytes(vec![1])]).is_none());
        let finalized = chan.ingest(hdr(2, 0), vec![PayloadHandle::from_bytes(vec![2])]).unwrap();
        assert_eq!(finalized.tf_id(), 1);
        let next = chan.finish().unwrap();
        assert_eq!(next.tf_id(), 2);
    }

    #[test]
    fn tf_id_regression_is_counted_and_continues_as_new() {
        let mut chan = InputChannel::new([1; 16], *b"TPC\0");
        chan.ingest(hdr(5, 0), vec![PayloadHandle::from_bytes(vec![1])]);
        let finalized = chan.ingest(hdr(3, 0), vec![PayloadHandle::from_bytes(vec![2])]).unwrap();
        assert_eq!(finalized.tf_id(), 5);
        assert_eq!(chan.tf_regressions, 1);
        let next = chan.finish().unwrap();
        assert_eq!(next.tf_id(), 3);
    }
}
