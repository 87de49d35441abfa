//! In-memory STF/TF representation.
//!
//! Grounded on `original_source/.../Common/SubTimeFrameDataModel.h`: an STF is
//! a header plus a sorted map from `EquipmentIdentifier` to the fragments
//! collected for it. The source keeps this as `std::map<EquipmentIdentifier,
//! EquipmentHBFrames>`, which is already sorted iteration order -- `BTreeMap`
//! is the direct translation.

use std::collections::BTreeMap;

use dd_utils::PayloadHandle;

pub type TimeFrameIdType = u64;

/// Identifies one logical data source within an STF: `(data_description,
/// data_origin, sub_specification)`, totally ordered lexicographically.
///
/// The source's `operator<` compares `sub_specification` against itself in
/// its tie-break branch, which can never distinguish two identifiers that
/// share `(description, origin)` -- spec.md §9 calls this out explicitly and
/// asks for the intended strict order, which is what `derive(Ord)` gives for
/// free from field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EquipmentIdentifier {
    pub data_description: [u8; 16],
    pub data_origin: [u8; 4],
    pub sub_specification: u64,
}

impl EquipmentIdentifier {
    pub fn new(data_description: [u8; 16], data_origin: [u8; 4], sub_specification: u64) -> Self {
        EquipmentIdentifier {
            data_description,
            data_origin,
            sub_specification,
        }
    }
}

/// Per-equipment header. `header_size`/`payload_count` are wire-facing
/// bookkeeping fields; `payload_count` is recomputed from the live payload
/// vector before every serialize, so it is never allowed to drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquipmentHeader {
    pub identifier: EquipmentIdentifier,
    pub header_size: u32,
    pub payload_count: u32,
}

impl EquipmentHeader {
    pub fn new(identifier: EquipmentIdentifier) -> Self {
        EquipmentHeader {
            identifier,
            header_size: crate::wire::headers::EQUIPMENT_HEADER_SIZE as u32,
            payload_count: 0,
        }
    }
}

/// One equipment's ordered fragment list. Payload order is insertion order
/// and is preserved exactly across serialize/deserialize (spec.md §3).
#[derive(Debug, Default)]
pub struct EquipmentHBFrames {
    pub header: EquipmentHeader,
    payloads: Vec<PayloadHandle>,
}

impl Default for EquipmentHeader {
    fn default() -> Self {
        EquipmentHeader::new(EquipmentIdentifier::new([0; 16], [0; 4], 0))
    }
}

impl EquipmentHBFrames {
    pub fn new(identifier: EquipmentIdentifier) -> Self {
        EquipmentHBFrames {
            header: EquipmentHeader::new(identifier),
            payloads: Vec::new(),
        }
    }

    pub fn identifier(&self) -> EquipmentIdentifier {
        self.header.identifier
    }

    pub fn push(&mut self, payload: PayloadHandle) {
        self.payloads.push(payload);
        self.header.payload_count = self.payloads.len() as u32;
    }

    pub fn extend(&mut self, payloads: impl IntoIterator<Item = PayloadHandle>) {
        for p in payloads {
            self.push(p);
        }
    }

    pub fn payloads(&self) -> &[PayloadHandle] {
        &self.payloads
    }

    pub fn into_payloads(self) -> Vec<PayloadHandle> {
        self.payloads
    }

    /// Total byte size of all payloads -- the source's `getDataSize()`.
    pub fn data_size(&self) -> u64 {
        self.payloads.iter().map(|p| p.len() as u64).sum()
    }

    /// Drains `other`'s payloads onto the end of this equipment's sequence,
    /// the equipment-level half of `SubTimeFrame::operator+=`.
    fn append(&mut self, other: EquipmentHBFrames) {
        self.payloads.extend(other.payloads);
        self.header.payload_count = self.payloads.len() as u32;
    }
}

/// Header fields carried alongside the equipment map. `eq_count` is the
/// source's `payload_size` field reused to mean "number of equipment
/// sub-trees" -- spec.md §9 asks that the overload get a clear name in the
/// rewrite while staying wire-compatible, hence the `eq_count` accessor
/// instead of a field literally named `payload_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubTimeFrameHeader {
    pub data_description: [u8; 16],
    pub data_origin: [u8; 4],
    pub sub_specification: u64,
    pub serialization_method: u64,
    pub tf_id: TimeFrameIdType,
    pub max_hbframes: u32,
    pub header_size: u32,
    pub eq_count: u32,
}

impl SubTimeFrameHeader {
    pub fn new(tf_id: TimeFrameIdType) -> Self {
        SubTimeFrameHeader {
            data_description: *b"STF_DATA\0\0\0\0\0\0\0\0",
            data_origin: *b"STF\0",
            sub_specification: 0,
            serialization_method: 0,
            tf_id,
            max_hbframes: 0,
            header_size: crate::wire::headers::STF_HEADER_SIZE as u32,
            eq_count: 0,
        }
    }
}

/// A SubTimeFrame: all readout fragments one producer node collected for one
/// tf-id. `TimeFrame` is the structurally identical result of merging the
/// STFs of all producers for that tf-id (spec.md §3).
#[derive(Debug)]
pub struct SubTimeFrame {
    pub header: SubTimeFrameHeader,
    equipment: BTreeMap<EquipmentIdentifier, EquipmentHBFrames>,
}

pub type TimeFrame = SubTimeFrame;

impl SubTimeFrame {
    pub fn new(tf_id: TimeFrameIdType) -> Self {
        SubTimeFrame {
            header: SubTimeFrameHeader::new(tf_id),
            equipment: BTreeMap::new(),
        }
    }

    pub fn tf_id(&self) -> TimeFrameIdType {
        self.header.tf_id
    }

    pub fn eq_count(&self) -> u32 {
        self.equipment.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty()
    }

    /// Appends payloads under `identifier`, creating the equipment entry if
    /// absent -- invariant 4: addition to an existing entry appends rather
    /// than replaces.
    pub fn add_hbframes(&mut self, identifier: EquipmentIdentifier, payloads: impl IntoIterator<Item = PayloadHandle>) {
        let entry = self
            .equipment
            .entry(identifier)
            .or_insert_with(|| EquipmentHBFrames::new(identifier));
        entry.extend(payloads);
        self.header.eq_count = self.equipment.len() as u32;
    }

    pub fn insert_equipment(&mut self, eq: EquipmentHBFrames) {
        let id = eq.identifier();
        match self.equipment.remove(&id) {
            Some(mut existing) => {
                existing.append(eq);
                self.equipment.insert(id, existing);
            }
            None => {
                self.equipment.insert(id, eq);
            }
        }
        self.header.eq_count = self.equipment.len() as u32;
    }

    pub fn remove_equipment(&mut self, identifier: &EquipmentIdentifier) -> Option<EquipmentHBFrames> {
        let removed = self.equipment.remove(identifier);
        self.header.eq_count = self.equipment.len() as u32;
        removed
    }

    /// Iterates equipment in sorted identifier order -- the order the wire
    /// formats rely on (spec.md §3, §6.1, §6.2).
    pub fn iter(&self) -> impl Iterator<Item = (&EquipmentIdentifier, &EquipmentHBFrames)> {
        self.equipment.iter()
    }

    pub fn into_iter(self) -> impl Iterator<Item = (EquipmentIdentifier, EquipmentHBFrames)> {
        self.equipment.into_iter()
    }

    pub fn data_size(&self) -> u64 {
        self.equipment.values().map(|eq| eq.data_size()).sum()
    }

    /// Destructively adopts all of `other`'s equipment entries, concatenating
    /// payload sequences for identifiers present in both (spec.md §3's
    /// `operator+=`; §5 notes the concatenation order across producers is
    /// otherwise unspecified).
    pub fn merge(&mut self, other: SubTimeFrame) {
        for (_id, eq) in other.equipment {
            self.insert_equipment(eq);
        }
    }
}

impl std::ops::AddAssign for SubTimeFrame {
    fn add_assign(&mut self, rhs: SubTimeFrame) {
        self.merge(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(desc: u8, spec: u64) -> EquipmentIdentifier {
        let mut d = [0u8; 16];
        d[0] = desc;
        EquipmentIdentifier::new(d, *b"TPC\0", spec)
    }

    #[test]
    fn identifier_orders_lexicographically_not_self_compared() {
        let a = id(1, 5);
        let b = id(1, 6);
        let c = id(2, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn add_hbframes_appends_to_existing_entry() {
        let mut stf = SubTimeFrame::new(7);
        let e = id(1, 0);
        stf.add_hbframes(e, vec![PayloadHandle::from_bytes(vec![1, 2])]);
        stf.add_hbframes(e, vec![PayloadHandle::from_bytes(vec![3, 4])]);
        assert_eq!(stf.eq_count(), 1);
        let (_, eq) = stf.iter().next().unwrap();
        assert_eq!(eq.payloads().len(), 2);
    }

    #[test]
    fn merge_concatenates_shared_equipment_and_unions_disjoint() {
        let mut a = SubTimeFrame::new(1);
        a.add_hbframes(id(1, 0), vec![PayloadHandle::from_bytes(vec![1])]);

        let mut b = SubTimeFrame::new(1);
        b.add_hbframes(id(1, 0), vec![PayloadHandle::from_bytes(vec![2])]);
        b.add_hbframes(id(2, 0), vec![PayloadHandle::from_bytes(vec![3])]);

        a.merge(b);
        assert_eq!(a.eq_count(), 2);
        let shared = a.iter().find(|(i, _)| **i == id(1, 0)).unwrap().1;
        assert_eq!(shared.payloads().len(), 2);
    }

    #[test]
    fn merge_associative_on_disjoint_equipment_keys() {
        let mut a1 = SubTimeFrame::new(1);
        a1.add_hbframes(id(1, 0), vec![PayloadHandle::from_bytes(vec![1])]);
        let mut b1 = SubTimeFrame::new(1);
        b1.add_hbframes(id(2, 0), vec![PayloadHandle::from_bytes(vec![2])]);
        let mut c1 = SubTimeFrame::new(1);
        c1.add_hbframes(id(3, 0), vec![PayloadHandle::from_bytes(vec![3])]);

        let mut a2 = SubTimeFrame::new(1);
        a2.add_hbframes(id(1, 0), vec![PayloadHandle::from_bytes(vec![1])]);
        let mut b2 = SubTimeFrame::new(1);
        b2.add_hbframes(id(2, 0), vec![PayloadHandle::from_bytes(vec![2])]);
        let mut c2 = SubTimeFrame::new(1);
        c2.add_hbframes(id(3, 0), vec![PayloadHandle::from_bytes(vec![3])]);

        a1.merge(b1);
        a1.merge(c1);

        b2.merge(c2);
        a2.merge(b2);

        let left: Vec<_> = a1.iter().map(|(i, _)| *i).collect();
        let right: Vec<_> = a2.iter().map(|(i, _)| *i).collect();
        assert_eq!(left, right);
    }
}
