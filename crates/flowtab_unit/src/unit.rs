//! Slot storage, allocation, and the handle-check protocol shared by the
//! three disciplines.

use std::cell::RefCell;

use flowtab_core::{
    error::{MatchError, MatchResult},
    handle::{EntryHandle, HandleAllocator},
};

thread_local! {
    // Reused across lookups so the hot path does not allocate.
    static SCRATCH_KEY: RefCell<Vec<u8>> = RefCell::new(Vec::new());
}

/// Runs `f` with the thread's cleared scratch key buffer.
pub(crate) fn with_scratch_key<R>(f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
    SCRATCH_KEY.with(|key| {
        let mut key = key.borrow_mut();
        key.clear();
        f(&mut key)
    })
}

/// Storage slot of a match-unit variant.
///
/// The version outlives occupancies: it is bumped on retirement and kept
/// when the slot is reused, which is what makes stale handles detectable.
pub(crate) trait SlotEntry: Default {
    type Value;

    fn version(&self) -> u32;

    /// Bumps the version, invalidating handles issued for this occupancy.
    fn retire(&mut self);

    fn value(&self) -> Option<&Self::Value>;

    fn replace_value(&mut self, value: Self::Value);
}

/// Entry vector, slot allocator, and handle checks common to every variant.
pub(crate) struct UnitCore<E> {
    nbytes_key: usize,
    entries: Vec<E>,
    handles: HandleAllocator,
}

impl<E: SlotEntry> UnitCore<E> {
    pub fn new(nbytes_key: usize, capacity: usize) -> Self {
        let mut entries = Vec::new();
        entries.resize_with(capacity, E::default);
        UnitCore {
            nbytes_key,
            entries,
            handles: HandleAllocator::new(capacity),
        }
    }

    #[inline]
    pub fn nbytes_key(&self) -> usize {
        self.nbytes_key
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn num_entries(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn entry(&self, slot: u32) -> &E {
        &self.entries[slot as usize]
    }

    #[inline]
    pub fn entry_mut(&mut self, slot: u32) -> &mut E {
        &mut self.entries[slot as usize]
    }

    /// Reserves a slot for a new entry. The returned version is the slot's
    /// current one, which the public handle embeds.
    pub fn reserve(&mut self) -> MatchResult<(u32, u32)> {
        if self.num_entries() >= self.capacity() {
            return Err(MatchError::TableFull);
        }
        let slot = self
            .handles
            .acquire()
            .ok_or_else(|| MatchError::internal("allocator exhausted below capacity"))?;
        let version = self.entries[slot as usize].version();
        Ok((slot, version))
    }

    /// Returns a retired slot to the allocator.
    pub fn release(&mut self, slot: u32) -> MatchResult<()> {
        if !self.handles.release(slot) {
            return Err(MatchError::InvalidHandle);
        }
        Ok(())
    }

    /// The uniform handle check: decode the slot, require liveness, then
    /// require the version embedded in the handle to match the slot's.
    pub fn checked_slot(&self, handle: EntryHandle) -> MatchResult<u32> {
        let slot = handle.slot();
        if !self.handles.is_live(slot) {
            return Err(MatchError::InvalidHandle);
        }
        if self.entries[slot as usize].version() != handle.version() {
            return Err(MatchError::ExpiredHandle);
        }
        Ok(slot)
    }

    pub fn valid_handle(&self, handle: EntryHandle) -> bool {
        self.checked_slot(handle).is_ok()
    }

    pub fn modify_entry(&mut self, handle: EntryHandle, value: E::Value) -> MatchResult<()> {
        let slot = self.checked_slot(handle)?;
        self.entries[slot as usize].replace_value(value);
        Ok(())
    }

    pub fn get_value(&self, handle: EntryHandle) -> MatchResult<&E::Value> {
        let slot = self.checked_slot(handle)?;
        self.entries[slot as usize]
            .value()
            .ok_or_else(|| MatchError::internal("live slot has no value"))
    }

    /// Live slots in ascending order; stable between mutations.
    pub fn live_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.handles.iter()
    }
}
