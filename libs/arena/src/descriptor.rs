//! Raw DMA packet descriptors.
//!
//! Mirrors the fixed-size descriptor records `CRUMemoryHandler` carves out of
//! its descriptor region in `original_source/Readout/src/CRUMemoryHandler.cxx`
//! -- one descriptor per sub-buffer, holding just enough to hand a completed
//! HBFrame off to the readout pipeline without walking the data region.
//! Unlike the data region these are small `Copy` records, so they live behind
//! a plain `Mutex<Vec<_>>` rather than raw pointers.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDmaPacketDesc {
    pub hbf_id: u32,
    pub raw_size: u32,
    pub valid: bool,
}

impl RawDmaPacketDesc {
    pub const SIZE_BYTES: usize = 16;

    pub fn empty() -> Self {
        RawDmaPacketDesc {
            hbf_id: 0,
            raw_size: 0,
            valid: false,
        }
    }
}
