//! Fixed bit layouts for the two wire formats, reproduced byte-for-byte from
//! spec.md §6.3. All integers are little-endian; `byteorder` does the actual
//! encode/decode the same way the rest of this workspace's crates already
//! favor it over hand-rolled `to_le_bytes` plumbing.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::model::{EquipmentHeader, EquipmentIdentifier, SubTimeFrameHeader};

pub const STF_HEADER_SIZE: usize = 16 + 4 + 8 + 8 + 8 + 4 + 4 + 4;
pub const EQUIPMENT_HEADER_SIZE: usize = 16 + 4 + 8 + 4 + 4;

pub fn write_stf_header<W: Write>(w: &mut W, h: &SubTimeFrameHeader) -> io::Result<()> {
    w.write_all(&h.data_description)?;
    w.write_all(&h.data_origin)?;
    w.write_u64::<LittleEndian>(h.sub_specification)?;
    w.write_u64::<LittleEndian>(h.serialization_method)?;
    w.write_u64::<LittleEndian>(h.tf_id)?;
    w.write_u32::<LittleEndian>(h.max_hbframes)?;
    w.write_u32::<LittleEndian>(h.header_size)?;
    w.write_u32::<LittleEndian>(h.eq_count)
}

pub fn read_stf_header<R: Read>(r: &mut R) -> io::Result<SubTimeFrameHeader> {
    let mut data_description = [0u8; 16];
    r.read_exact(&mut data_description)?;
    let mut data_origin = [0u8; 4];
    r.read_exact(&mut data_origin)?;
    let sub_specification = r.read_u64::<LittleEndian>()?;
    let serialization_method = r.read_u64::<LittleEndian>()?;
    let tf_id = r.read_u64::<LittleEndian>()?;
    let max_hbframes = r.read_u32::<LittleEndian>()?;
    let header_size = r.read_u32::<LittleEndian>()?;
    let eq_count = r.read_u32::<LittleEndian>()?;
    Ok(SubTimeFrameHeader {
        data_description,
        data_origin,
        sub_specification,
        serialization_method,
        tf_id,
        max_hbframes,
        header_size,
        eq_count,
    })
}

pub fn write_equipment_header<W: Write>(w: &mut W, h: &EquipmentHeader) -> io::Result<()> {
    w.write_all(&h.identifier.data_description)?;
    w.write_all(&h.identifier.data_origin)?;
    w.write_u64::<LittleEndian>(h.identifier.sub_specification)?;
    w.write_u32::<LittleEndian>(h.header_size)?;
    w.write_u32::<LittleEndian>(h.payload_count)
}

pub fn read_equipment_header<R: Read>(r: &mut R) -> io::Result<EquipmentHeader> {
    let mut data_description = [0u8; 16];
    r.read_exact(&mut data_description)?;
    let mut data_origin = [0u8; 4];
    r.read_exact(&mut data_origin)?;
    let sub_specification = r.read_u64::<LittleEndian>()?;
    let header_size = r.read_u32::<LittleEndian>()?;
    let payload_count = r.read_u32::<LittleEndian>()?;
    Ok(EquipmentHeader {
        identifier: EquipmentIdentifier::new(data_description, data_origin, sub_specification),
        header_size,
        payload_count,
    })
}

/// Producer-ingress header, `original_source/.../ReadoutDataModel.h`'s
/// `ReadoutSubTimeframeHeader` as consumed by `SubTimeFrameBuilderInput.cxx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadoutSubTimeframeHeader {
    pub tf_id: u32,
    pub hbframe_count: u32,
    pub link_id: u8,
}

pub const READOUT_SUBTF_HEADER_SIZE: usize = 4 + 4 + 1;

pub fn write_readout_header<W: Write>(w: &mut W, h: &ReadoutSubTimeframeHeader) -> io::Result<()> {
    w.write_u32::<LittleEndian>(h.tf_id)?;
    w.write_u32::<LittleEndian>(h.hbframe_count)?;
    w.write_u8(h.link_id)
}

pub fn read_readout_header<R: Read>(r: &mut R) -> io::Result<ReadoutSubTimeframeHeader> {
    let tf_id = r.read_u32::<LittleEndian>()?;
    let hbframe_count = r.read_u32::<LittleEndian>()?;
    let link_id = r.read_u8()?;
    Ok(ReadoutSubTimeframeHeader {
        tf_id,
        hbframe_count,
        link_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stf_header_round_trips() {
        let h = SubTimeFrameHeader::new(42);
        let mut buf = Vec::new();
        write_stf_header(&mut buf, &h).unwrap();
        assert_eq!(buf.len(), STF_HEADER_SIZE);
        let back = read_stf_header(&mut &buf[..]).unwrap();
        assert_eq!(back.tf_id, 42);
        assert_eq!(back, h);
    }

    #[test]
    fn equipment_header_round_trips() {
        let h = EquipmentHeader::new(EquipmentIdentifier::new([7; 16], *b"TPC\0", 3));
        let mut buf = Vec::new();
        write_equipment_header(&mut buf, &h).unwrap();
        assert_eq!(buf.len(), EQUIPMENT_HEADER_SIZE);
        let back = read_equipment_header(&mut &buf[..]).unwrap();
        assert_eq!(back.identifier, h.identifier);
    }
}
