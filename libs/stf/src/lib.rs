//! SubTimeFrame/TimeFrame data model, wire codecs, and the equipment
//! splitter (C2).

pub mod error;
pub mod model;
pub mod split;
pub mod transport;
pub mod wire;

pub use error::StfCodecError;
pub use model::{
    EquipmentHBFrames, EquipmentHeader, EquipmentIdentifier, SubTimeFrame, SubTimeFrameHeader, TimeFrame,
    TimeFrameIdType,
};
pub use split::{split, EquipmentPattern};
pub use wire::headers::ReadoutSubTimeframeHeader;
