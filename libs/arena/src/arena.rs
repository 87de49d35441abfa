//! Superpage bookkeeping.
//!
//! Grounded on `original_source/Readout/src/CRUMemoryHandler.cxx`: a data
//! region is carved into fixed-size superpages, each superpage further carved
//! into fixed-size sub-buffers. A LIFO free list hands out whole superpages to
//! the readout/CRU side; `mark_used`/`release` track individual sub-buffers
//! within a superpage that is currently checked out, matching
//! `CRUMemoryHandler::getNewDataBlock` / `freeDataBlock`.
//!
//! Per spec.md §5 ("Accounting belongs to C1 alone" / "no operation may hold
//! the arena mutex across an I/O call"), the bookkeeping mutex below never
//! guards access to the data region itself -- `DataRegion` reads/writes are
//! unsynchronized by design and rely on the single-writer-per-slot discipline
//! the caller upholds.

use std::collections::HashMap;
use std::sync::Mutex;

use dd_utils::ConfigError;
use prometheus::IntGauge;

use crate::descriptor::RawDmaPacketDesc;
use crate::error::ArenaError;
use crate::region::DataRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    pub data_region_size: usize,
    pub desc_region_size: usize,
    pub superpage_size: usize,
    pub subbuffer_size: usize,
}

/// A superpage handed out to a single producer at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superpage {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
}

struct Inner {
    free_stack: Vec<usize>,
    used: HashMap<usize, HashMap<usize, usize>>,
}

pub struct Arena {
    config: ArenaConfig,
    data: DataRegion,
    descriptors: Mutex<Vec<RawDmaPacketDesc>>,
    inner: Mutex<Inner>,
    /// §7.3 ambient metric: free-superpage count, not wired to an HTTP
    /// exporter here (that's `stf-builder`'s caller's concern, if any).
    free_superpages_metric: IntGauge,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        dd_utils::config::require_power_of_two("superpage-size", config.superpage_size as u64)?;

        if config.data_region_size % config.superpage_size != 0 {
            return Err(ConfigError::OutOfRange {
                name: "data-region-size",
                value: config.data_region_size as u64,
                min: config.superpage_size as u64,
                max: u64::MAX,
            });
        }

        let subbuffer_count = config.data_region_size / config.subbuffer_size;
        let needed = subbuffer_count * RawDmaPacketDesc::SIZE_BYTES;
        if config.desc_region_size < needed {
            return Err(ConfigError::DescriptorRegionTooSmall {
                needed,
                actual: config.desc_region_size,
            });
        }

        let num_superpages = config.data_region_size / config.superpage_size;
        let data = DataRegion::new(config.data_region_size, 0xDA);
        let descriptors = vec![RawDmaPacketDesc::empty(); subbuffer_count];
        let free_superpages_metric = IntGauge::new("dd_arena_free_superpages", "Superpages currently on the free stack")
            .expect("static metric name/help are valid");
        free_superpages_metric.set(num_superpages as i64);

        Ok(Arena {
            config,
            data,
            descriptors: Mutex::new(descriptors),
            inner: Mutex::new(Inner {
                free_stack: (0..num_superpages).rev().collect(),
                used: HashMap::new(),
            }),
            free_superpages_metric,
        })
    }

    pub fn num_superpages(&self) -> usize {
        self.config.data_region_size / self.config.superpage_size
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().unwrap().free_stack.len()
    }

    /// Free-superpage gauge (§7.3); snapshotted independently of
    /// `free_count` so a caller can expose it without taking the lock.
    pub fn free_superpages_metric(&self) -> &IntGauge {
        &self.free_superpages_metric
    }

    /// Pops one superpage off the free LIFO stack, matching
    /// `CRUMemoryHandler`'s preference for reusing the most recently freed
    /// page (better cache locality than a FIFO).
    pub fn acquire_superpage(&self) -> Option<Superpage> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.free_stack.pop()?;
        inner.used.entry(index).or_default();
        self.free_superpages_metric.set(inner.free_stack.len() as i64);
        Some(Superpage {
            index,
            offset: index * self.config.superpage_size,
            size: self.config.superpage_size,
        })
    }

    /// Records that `size` bytes at `offset` within `superpage` are occupied
    /// by a producer. `offset` is relative to the data region, not the
    /// superpage.
    pub fn mark_used(&self, superpage: Superpage, offset: usize, size: usize) -> Result<(), ArenaError> {
        if offset + size > self.config.data_region_size {
            return Err(ArenaError::AddressOutOfRegion {
                addr: offset,
                region_size: self.config.data_region_size,
            });
        }

        let mut inner = self.inner.lock().unwrap();
        let slots = inner
            .used
            .entry(superpage.index)
            .or_default();
        if slots.contains_key(&offset) {
            return Err(ArenaError::AlreadyUsed { addr: offset });
        }
        slots.insert(offset, size);
        Ok(())
    }

    /// Releases a sub-buffer previously marked used. When a superpage's used
    /// set becomes empty the superpage itself goes back onto the free stack.
    pub fn release(&self, superpage: Superpage, offset: usize, size: usize) -> Result<(), ArenaError> {
        let mut inner = self.inner.lock().unwrap();
        let slots = inner
            .used
            .get_mut(&superpage.index)
            .ok_or(ArenaError::NotInUsedList { addr: offset })?;

        let recorded = slots
            .remove(&offset)
            .ok_or(ArenaError::NotInUsedList { addr: offset })?;
        if recorded != size {
            slots.insert(offset, recorded);
            return Err(ArenaError::SizeMismatch {
                addr: offset,
                recorded,
                released: size,
            });
        }

        if slots.is_empty() {
            inner.used.remove(&superpage.index);
            inner.free_stack.push(superpage.index);
            self.free_superpages_metric.set(inner.free_stack.len() as i64);
        }
        Ok(())
    }

    /// Safety: caller must ensure `offset + size <= data_region_size` and
    /// that no other thread concurrently writes the same range.
    pub unsafe fn read(&self, offset: usize, size: usize) -> &[u8] {
        self.data.read(offset, size)
    }

    /// Safety: caller must hold exclusive write access to this byte range.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn write(&self, offset: usize, size: usize) -> &mut [u8] {
        self.data.write(offset, size)
    }

    /// Maps a data-region byte offset to its owning superpage index via
    /// `addr & ~(S-1)` (spec.md §4.1's addressing rule, applied to an offset
    /// rather than a raw pointer since there is no real `mmap` here).
    fn superpage_index_for(&self, addr: usize) -> usize {
        (addr & !(self.config.superpage_size - 1)) / self.config.superpage_size
    }

    /// Address-only counterpart to [`Arena::release`], for callers (e.g. a
    /// free-shm back-channel) that only know the byte offset and size of a
    /// sub-buffer, not which `Superpage` handle it came from.
    pub fn release_addr(&self, addr: usize, size: usize) -> Result<(), ArenaError> {
        if addr >= self.config.data_region_size {
            return Err(ArenaError::AddressOutOfRegion {
                addr,
                region_size: self.config.data_region_size,
            });
        }
        let index = self.superpage_index_for(addr);
        let superpage = Superpage {
            index,
            offset: index * self.config.superpage_size,
            size: self.config.superpage_size,
        };
        self.release(superpage, addr, size)
    }

    pub fn set_descriptor(&self, slot: usize, desc: RawDmaPacketDesc) {
        self.descriptors.lock().unwrap()[slot] = desc;
    }

    pub fn descriptor(&self, slot: usize) -> RawDmaPacketDesc {
        self.descriptors.lock().unwrap()[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ArenaConfig {
        ArenaConfig {
            data_region_size: 4 * 1024,
            desc_region_size: 1024,
            superpage_size: 1024,
            subbuffer_size: 256,
        }
    }

    #[test]
    fn rejects_non_power_of_two_superpage() {
        let mut config = small_config();
        config.superpage_size = 900;
        assert!(Arena::new(config).is_err());
    }

    #[test]
    fn rejects_undersized_descriptor_region() {
        let mut config = small_config();
        config.desc_region_size = 4;
        assert!(Arena::new(config).is_err());
    }

    #[test]
    fn acquire_all_then_empty() {
        let arena = Arena::new(small_config()).unwrap();
        assert_eq!(arena.num_superpages(), 4);
        for _ in 0..4 {
            assert!(arena.acquire_superpage().is_some());
        }
        assert!(arena.acquire_superpage().is_none());
        assert_eq!(arena.free_count(), 0);
    }

    #[test]
    fn release_returns_superpage_to_free_stack_only_when_fully_drained() {
        let arena = Arena::new(small_config()).unwrap();
        let page = arena.acquire_superpage().unwrap();
        arena.mark_used(page, page.offset, 256).unwrap();
        arena.mark_used(page, page.offset + 256, 256).unwrap();
        assert_eq!(arena.free_count(), 3);

        arena.release(page, page.offset, 256).unwrap();
        assert_eq!(arena.free_count(), 3, "superpage still has an outstanding sub-buffer");

        arena.release(page, page.offset + 256, 256).unwrap();
        assert_eq!(arena.free_count(), 4, "superpage returns once fully drained");
    }

    #[test]
    fn double_mark_used_is_rejected() {
        let arena = Arena::new(small_config()).unwrap();
        let page = arena.acquire_superpage().unwrap();
        arena.mark_used(page, page.offset, 256).unwrap();
        assert!(arena.mark_used(page, page.offset, 256).is_err());
    }

    #[test]
    fn release_unknown_offset_is_rejected() {
        let arena = Arena::new(small_config()).unwrap();
        let page = arena.acquire_superpage().unwrap();
        assert!(arena.release(page, page.offset, 256).is_err());
    }

    #[test]
    fn single_superpage_region_acquires_exactly_one() {
        let config = ArenaConfig {
            data_region_size: 1024,
            desc_region_size: 1024,
            superpage_size: 1024,
            subbuffer_size: 256,
        };
        let arena = Arena::new(config).unwrap();
        assert_eq!(arena.num_superpages(), 1);
        assert!(arena.acquire_superpage().is_some());
        assert!(arena.acquire_superpage().is_none());
    }

    #[test]
    fn release_addr_resolves_superpage_via_mask() {
        let arena = Arena::new(small_config()).unwrap();
        let page = arena.acquire_superpage().unwrap();
        arena.mark_used(page, page.offset + 256, 256).unwrap();
        arena.release_addr(page.offset + 256, 256).unwrap();
        assert_eq!(arena.free_count(), 4);
    }

    #[test]
    fn read_write_round_trip_within_marked_range() {
        let arena = Arena::new(small_config()).unwrap();
        let page = arena.acquire_superpage().unwrap();
        arena.mark_used(page, page.offset, 256).unwrap();
        unsafe {
            arena.write(page.offset, 256).copy_from_slice(&[7u8; 256]);
            assert_eq!(arena.read(page.offset, 256), &[7u8; 256][..]);
        }
    }
}
