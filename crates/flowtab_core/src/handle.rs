//! Entry handles and slot allocation.
//!
//! A match unit stores entries in a dense vector indexed by slot id. The
//! control plane never sees slot ids directly; it holds [`EntryHandle`]s,
//! which pair the slot with the version the slot carried when the entry was
//! installed. Deleting an entry bumps the slot's version, so a handle issued
//! before a delete (or a delete-then-reinsert on the same slot) is
//! detectable as stale.

use bitvec::prelude::*;

/// Public token for an installed entry.
///
/// The 64-bit layout is stable: the high 32 bits carry the version, the low
/// 32 bits the slot id. The layout is a wire-visible contract when handles
/// cross process boundaries; everything else should treat the token as
/// opaque and go through [`version`](EntryHandle::version) and
/// [`slot`](EntryHandle::slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(u64);

impl EntryHandle {
    /// Packs a version and a slot id into a handle.
    #[inline]
    pub fn new(version: u32, slot: u32) -> Self {
        EntryHandle(((version as u64) << 32) | slot as u64)
    }

    /// Version of the slot at the time the handle was issued.
    #[inline]
    pub fn version(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Dense slot index into the unit's entry vector.
    #[inline]
    pub fn slot(self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }

    /// The raw 64-bit token.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Reconstructs a handle from its raw token.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        EntryHandle(raw)
    }
}

/// Allocates dense slot ids for a fixed-capacity match unit.
///
/// Slots are handed out from a free-list stack and tracked in a liveness
/// bitmap. Released slots are reused LIFO, so a delete-then-add typically
/// lands on the same slot (with a bumped version). Iteration yields live
/// slots in ascending order, which is the stable order `dump` and the
/// ternary scan rely on.
#[derive(Debug, Clone)]
pub struct HandleAllocator {
    live: BitVec,
    free: Vec<u32>,
}

impl HandleAllocator {
    /// Creates an allocator with `capacity` slots, all free.
    pub fn new(capacity: usize) -> Self {
        HandleAllocator {
            live: bitvec![0; capacity],
            // reversed so the stack pops slot 0 first
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.live.len()
    }

    /// Number of live slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.count_ones()
    }

    /// True when no slot is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserves a free slot, or `None` when every slot is taken.
    pub fn acquire(&mut self) -> Option<u32> {
        let slot = self.free.pop()?;
        self.live.set(slot as usize, true);
        Some(slot)
    }

    /// Frees a reserved slot. Returns `false` if the slot was not live.
    pub fn release(&mut self, slot: u32) -> bool {
        if !self.is_live(slot) {
            return false;
        }
        self.live.set(slot as usize, false);
        self.free.push(slot);
        true
    }

    /// Constant-time liveness query. Out-of-range slots are not live.
    #[inline]
    pub fn is_live(&self, slot: u32) -> bool {
        self.live.get(slot as usize).map(|bit| *bit).unwrap_or(false)
    }

    /// Iterates live slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.live.iter_ones().map(|slot| slot as u32)
    }
}
