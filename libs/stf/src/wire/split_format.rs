//! Split wire format (spec.md §6.2).
//!
//! Grounded on `original_source/.../SubTimeFrameVisitors.cxx`'s
//! `HdrDataSerializer`/`Deserializer`: all headers are sent together, then
//! all payloads together, each block prefixed with its own count so the
//! receiver knows exactly how many frames to pull off the wire before it
//! starts reconstructing the tree. The source prefixes each *block* with a
//! `size_t` count message; here both counts are sent up front as the two
//! 8-byte fields spec.md §6.2 specifies.

use crate::error::StfCodecError;
use crate::model::{EquipmentHBFrames, EquipmentHeader, SubTimeFrame, SubTimeFrameHeader};
use crate::transport::{read_payload, write_payload, FrameSink, FrameSource};
use crate::wire::headers::{read_equipment_header, read_stf_header, write_equipment_header, write_stf_header};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

fn io_err(what: &'static str, source: std::io::Error) -> StfCodecError {
    StfCodecError::Transport { what, source }
}

enum HeaderSlot {
    Stf(SubTimeFrameHeader),
    Equipment(EquipmentHeader),
}

pub fn serialize<W: FrameSink>(stf: &SubTimeFrame, w: &mut W) -> Result<(), StfCodecError> {
    let mut stf_header = stf.header;
    stf_header.eq_count = stf.eq_count();

    let mut headers = Vec::with_capacity(1 + stf.eq_count() as usize);
    let mut payload_count: u64 = 0;
    headers.push(HeaderSlot::Stf(stf_header));
    for (_, eq) in stf.iter() {
        let mut h = eq.header;
        h.payload_count = eq.payloads().len() as u32;
        payload_count += h.payload_count as u64;
        headers.push(HeaderSlot::Equipment(h));
    }

    w.write_u64::<LittleEndian>(headers.len() as u64)
        .map_err(|e| io_err("header count", e))?;
    w.write_u64::<LittleEndian>(payload_count)
        .map_err(|e| io_err("payload count", e))?;

    for slot in &headers {
        match slot {
            HeaderSlot::Stf(h) => write_stf_header(w, h).map_err(|e| io_err("stf header", e))?,
            HeaderSlot::Equipment(h) => write_equipment_header(w, h).map_err(|e| io_err("equipment header", e))?,
        }
    }
    for (_, eq) in stf.iter() {
        for payload in eq.payloads() {
            write_payload(w, payload).map_err(|e| io_err("payload", e))?;
        }
    }
    Ok(())
}

pub fn deserialize<R: FrameSource>(r: &mut R) -> Result<SubTimeFrame, StfCodecError> {
    let header_count = r.read_u64::<LittleEndian>().map_err(|e| io_err("header count", e))?;
    let payload_count = r.read_u64::<LittleEndian>().map_err(|e| io_err("payload count", e))?;
    if header_count == 0 {
        return Err(StfCodecError::CountMismatch {
            header_count,
            payload_count,
        });
    }

    let stf_header = read_stf_header(r).map_err(|e| io_err("stf header", e))?;
    let eq_header_count = header_count - 1;
    if eq_header_count != stf_header.eq_count as u64 {
        return Err(StfCodecError::CountMismatch {
            header_count,
            payload_count,
        });
    }

    let mut eq_headers = Vec::with_capacity(eq_header_count as usize);
    let mut expected_payloads: u64 = 0;
    for _ in 0..eq_header_count {
        let h = read_equipment_header(r).map_err(|e| io_err("equipment header", e))?;
        expected_payloads += h.payload_count as u64;
        eq_headers.push(h);
    }

    if expected_payloads != payload_count {
        return Err(StfCodecError::CountMismatch {
            header_count,
            payload_count,
        });
    }

    let mut stf = SubTimeFrame::new(stf_header.tf_id);
    stf.header = stf_header;

    for eq_header in eq_headers {
        let mut eq = EquipmentHBFrames::new(eq_header.identifier);
        for _ in 0..eq_header.payload_count {
            let payload = read_payload(r).map_err(|e| io_err("payload", e))?;
            eq.push(payload);
        }
        stf.insert_equipment(eq);
    }
    Ok(stf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EquipmentIdentifier;
    use dd_utils::PayloadHandle;

    #[test]
    fn round_trips_headers_then_payloads_blocks() {
        let mut stf = SubTimeFrame::new(99);
        let a = EquipmentIdentifier::new([1; 16], *b"TPC\0", 0);
        let b = EquipmentIdentifier::new([2; 16], *b"ITS\0", 0);
        stf.add_hbframes(a, vec![PayloadHandle::from_bytes(vec![1, 2, 3])]);
        stf.add_hbframes(b, vec![PayloadHandle::from_bytes(vec![4]), PayloadHandle::from_bytes(vec![5, 6])]);

        let mut buf = Vec::new();
        serialize(&stf, &mut buf).unwrap();
        let back = deserialize(&mut &buf[..]).unwrap();

        assert_eq!(back.tf_id(), 99);
        assert_eq!(back.eq_count(), 2);
        let entries: Vec<_> = back.iter().collect();
        assert_eq!(entries[0].1.payloads()[0].as_bytes(), &[1, 2, 3]);
        assert_eq!(entries[1].1.payloads()[1].as_bytes(), &[5, 6]);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u64::<LittleEndian>(0).unwrap();
        // claim 1 header but supply an STF header whose eq_count says 3
        let mut h = SubTimeFrameHeader::new(5);
        h.eq_count = 3;
        write_stf_header(&mut buf, &h).unwrap();
        assert!(deserialize(&mut &buf[..]).is_err());
    }
}
