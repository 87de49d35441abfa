//! Equipment-identifier-based STF splitting.
//!
//! Grounded on the `DataIdentifierSplitter` friend class declared in
//! `SubTimeFrameDataModel.h` (used by `SubTimeFrameSenderOutput.cxx` to peel
//! a subset of equipment off an STF before forwarding it down a specific
//! link). A pattern matches on `data_description` and/or `data_origin`;
//! `None` on either field means "match any", the wildcard spec.md §4.2 calls
//! for.

use crate::model::{EquipmentIdentifier, SubTimeFrame};

#[derive(Debug, Clone, Copy, Default)]
pub struct EquipmentPattern {
    pub data_description: Option<[u8; 16]>,
    pub data_origin: Option<[u8; 4]>,
}

impl EquipmentPattern {
    pub fn any() -> Self {
        EquipmentPattern::default()
    }

    pub fn matches(&self, id: &EquipmentIdentifier) -> bool {
        self.data_description
            .map_or(true, |d| d == id.data_description)
            && self.data_origin.map_or(true, |o| o == id.data_origin)
    }
}

/// Moves every equipment entry matching `pattern` out of `stf` into a new
/// STF carrying the same tf-id. Both STFs' `eq_count` are left consistent
/// with their post-split contents (spec.md §4.2).
pub fn split(stf: &mut SubTimeFrame, pattern: &EquipmentPattern) -> SubTimeFrame {
    let matching: Vec<EquipmentIdentifier> = stf
        .iter()
        .filter(|(id, _)| pattern.matches(id))
        .map(|(id, _)| *id)
        .collect();

    let mut out = SubTimeFrame::new(stf.tf_id());
    for id in matching {
        if let Some(eq) = stf.remove_equipment(&id) {
            out.insert_equipment(eq);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_utils::PayloadHandle;

    fn id(desc: u8, origin: &[u8; 4]) -> EquipmentIdentifier {
        let mut d = [0u8; 16];
        d[0] = desc;
        EquipmentIdentifier::new(d, *origin, 0)
    }

    #[test]
    fn split_is_complete_with_no_loss_or_duplication() {
        let mut stf = SubTimeFrame::new(1);
        let tpc = id(1, b"TPC\0");
        let its = id(2, b"ITS\0");
        stf.add_hbframes(tpc, vec![PayloadHandle::from_bytes(vec![1])]);
        stf.add_hbframes(its, vec![PayloadHandle::from_bytes(vec![2])]);

        let pattern = EquipmentPattern {
            data_origin: Some(*b"TPC\0"),
            ..Default::default()
        };
        let split_out = split(&mut stf, &pattern);

        assert_eq!(split_out.eq_count(), 1);
        assert_eq!(stf.eq_count(), 1);
        assert!(split_out.iter().any(|(i, _)| *i == tpc));
        assert!(stf.iter().any(|(i, _)| *i == its));
    }

    #[test]
    fn wildcard_pattern_takes_everything() {
        let mut stf = SubTimeFrame::new(1);
        stf.add_hbframes(id(1, b"TPC\0"), vec![PayloadHandle::from_bytes(vec![1])]);
        stf.add_hbframes(id(2, b"ITS\0"), vec![PayloadHandle::from_bytes(vec![2])]);

        let split_out = split(&mut stf, &EquipmentPattern::any());
        assert_eq!(split_out.eq_count(), 2);
        assert_eq!(stf.eq_count(), 0);
    }
}
