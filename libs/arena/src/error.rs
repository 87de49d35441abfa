use thiserror::Error;

/// Arena bookkeeping errors. Per spec.md §4.1/§7: these are logged and the
/// operation is skipped, they never abort the process -- a bad release is a
/// producer bug, not a safety violation, since no mutation happens on the
/// error path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("address {addr:#x} is outside the data region (size {region_size})")]
    AddressOutOfRegion { addr: usize, region_size: usize },

    #[error("sub-buffer at {addr:#x} is already marked used")]
    AlreadyUsed { addr: usize },

    #[error("sub-buffer at {addr:#x} is not in the used list")]
    NotInUsedList { addr: usize },

    #[error("sub-buffer at {addr:#x} size mismatch: recorded {recorded}, released {released}")]
    SizeMismatch {
        addr: usize,
        recorded: usize,
        released: usize,
    },
}
