//! Shared-memory-style superpage/sub-buffer arena (C1).
//!
//! A single process-local data region stands in for the real `mmap`'d shared
//! memory segment `CRUMemoryHandler` manages in `original_source/`; the
//! bookkeeping contract -- LIFO superpage free list, per-superpage used-slot
//! accounting, descriptors kept separate from the data they describe -- is
//! unchanged from that original.

mod arena;
mod descriptor;
mod error;
mod region;

pub use arena::{Arena, ArenaConfig, Superpage};
pub use descriptor::RawDmaPacketDesc;
pub use error::ArenaError;
pub use region::DataRegion;
