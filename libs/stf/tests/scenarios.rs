use dd_stf::model::{EquipmentIdentifier, SubTimeFrame};
use dd_stf::wire::{interleaved, split_format};
use dd_utils::PayloadHandle;

fn tpc(sub_spec: u64) -> EquipmentIdentifier {
    EquipmentIdentifier::new(*b"RAW\0\0\0\0\0\0\0\0\0\0\0\0\0", *b"TPC\0", sub_spec)
}

/// End-to-end scenario 1 from spec.md §8: single producer, single
/// aggregator, two equipments, both wire formats must agree bit-for-bit.
#[test]
fn single_tf_happy_path_both_formats() {
    let mut stf = SubTimeFrame::new(7);
    stf.add_hbframes(tpc(0), vec![PayloadHandle::from_bytes(vec![0xAA; 8192])]);
    stf.add_hbframes(tpc(1), vec![PayloadHandle::from_bytes(vec![0xBB; 8192])]);

    let mut interleaved_buf = Vec::new();
    interleaved::serialize(&stf, &mut interleaved_buf).unwrap();
    let from_interleaved = interleaved::deserialize(&mut &interleaved_buf[..]).unwrap();

    let mut split_buf = Vec::new();
    split_format::serialize(&stf, &mut split_buf).unwrap();
    let from_split = split_format::deserialize(&mut &split_buf[..]).unwrap();

    for decoded in [from_interleaved, from_split] {
        assert_eq!(decoded.tf_id(), 7);
        assert_eq!(decoded.eq_count(), 2);
        let entries: Vec<_> = decoded.iter().collect();
        assert_eq!(*entries[0].0, tpc(0));
        assert_eq!(*entries[1].0, tpc(1));
        assert_eq!(entries[0].1.payloads()[0].as_bytes(), &[0xAA; 8192][..]);
        assert_eq!(entries[1].1.payloads()[0].as_bytes(), &[0xBB; 8192][..]);
    }
}

/// End-to-end scenario 2: three producers with disjoint equipment merge into
/// one TF containing all three entries.
#[test]
fn three_producer_merge_is_disjoint_union() {
    let mut a = SubTimeFrame::new(42);
    a.add_hbframes(tpc(0), vec![PayloadHandle::from_bytes(vec![1])]);
    let mut b = SubTimeFrame::new(42);
    b.add_hbframes(tpc(1), vec![PayloadHandle::from_bytes(vec![2])]);
    let mut c = SubTimeFrame::new(42);
    c.add_hbframes(tpc(2), vec![PayloadHandle::from_bytes(vec![3])]);

    a.merge(b);
    a.merge(c);

    assert_eq!(a.eq_count(), 3);
    assert_eq!(a.tf_id(), 42);
}
