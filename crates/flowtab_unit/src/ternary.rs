//! Priority-ordered masked matching.

use std::{fmt::Display, io};

use tracing::trace;

use flowtab_core::{
    error::MatchResult,
    handle::EntryHandle,
    key::{self, HexBytes, KeyExtractor, MatchKeyParam},
};

use crate::{
    unit::{with_scratch_key, SlotEntry, UnitCore},
    MatchUnit,
};

#[derive(Debug)]
pub(crate) struct TernaryEntry<V> {
    key: Vec<u8>,
    mask: Vec<u8>,
    priority: i32,
    value: Option<V>,
    version: u32,
}

impl<V> TernaryEntry<V> {
    fn matches(&self, key: &[u8]) -> bool {
        self.key
            .iter()
            .zip(&self.mask)
            .zip(key)
            .all(|((entry_byte, mask_byte), key_byte)| *entry_byte == *key_byte & *mask_byte)
    }
}

impl<V> Default for TernaryEntry<V> {
    fn default() -> Self {
        TernaryEntry {
            key: Vec::new(),
            mask: Vec::new(),
            priority: 0,
            value: None,
            version: 0,
        }
    }
}

impl<V> SlotEntry for TernaryEntry<V> {
    type Value = V;

    fn version(&self) -> u32 {
        self.version
    }

    fn retire(&mut self) {
        self.version += 1;
    }

    fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    fn replace_value(&mut self, value: V) {
        self.value = Some(value);
    }
}

/// Match unit that selects entries by masked equality with priorities.
///
/// Lookup is a linear scan over live slots in ascending slot order. An
/// entry matches when `entry.key[i] == (key[i] & entry.mask[i])` for every
/// byte. Among matches, strictly greater priority wins; on equal priority
/// the first match in scan order (the lowest live slot) wins. That tie rule
/// is a hard contract, so callers that need a total order must assign
/// distinct priorities. Unlike the indexed disciplines, duplicate key/mask
/// pairs are not rejected; they resolve by the same rule.
pub struct MatchUnitTernary<V, K> {
    core: UnitCore<TernaryEntry<V>>,
    extractor: K,
}

impl<V: Display, K: KeyExtractor> MatchUnitTernary<V, K> {
    /// Creates a unit for `nbytes_key`-byte keys with a fixed `capacity`.
    pub fn new(nbytes_key: usize, capacity: usize, extractor: K) -> Self {
        MatchUnitTernary {
            core: UnitCore::new(nbytes_key, capacity),
            extractor,
        }
    }

    /// Looks up the highest-priority entry matching the key extracted from
    /// `header`.
    ///
    /// The returned borrow is valid until the next mutation of the unit.
    pub fn lookup(&self, header: &K::Header) -> Option<(EntryHandle, &V)> {
        with_scratch_key(|lookup_key| {
            self.extractor.extract(header, lookup_key);
            debug_assert_eq!(lookup_key.len(), self.core.nbytes_key());
            self.lookup_key(lookup_key)
        })
    }
}

impl<V: Display, K: KeyExtractor> MatchUnit<V> for MatchUnitTernary<V, K> {
    fn nbytes_key(&self) -> usize {
        self.core.nbytes_key()
    }

    fn capacity(&self) -> usize {
        self.core.capacity()
    }

    fn num_entries(&self) -> usize {
        self.core.num_entries()
    }

    fn add_entry(
        &mut self,
        params: &[MatchKeyParam],
        value: V,
        priority: i32,
    ) -> MatchResult<EntryHandle> {
        let (new_key, new_mask) = key::build_ternary_key(params, self.core.nbytes_key())?;
        let (slot, version) = self.core.reserve()?;
        let entry = self.core.entry_mut(slot);
        entry.key = new_key;
        entry.mask = new_mask;
        entry.priority = priority;
        entry.value = Some(value);
        trace!(
            slot,
            version,
            priority,
            key = %HexBytes(&entry.key),
            mask = %HexBytes(&entry.mask),
            "installed ternary entry"
        );
        Ok(EntryHandle::new(version, slot))
    }

    fn delete_entry(&mut self, handle: EntryHandle) -> MatchResult<()> {
        let slot = self.core.checked_slot(handle)?;
        // version first: a racing reader sees a stale version or a dead slot
        self.core.entry_mut(slot).retire();
        trace!(slot, "deleted ternary entry");
        self.core.release(slot)
    }

    fn modify_entry(&mut self, handle: EntryHandle, value: V) -> MatchResult<()> {
        self.core.modify_entry(handle, value)
    }

    fn get_value(&self, handle: EntryHandle) -> MatchResult<&V> {
        self.core.get_value(handle)
    }

    fn valid_handle(&self, handle: EntryHandle) -> bool {
        self.core.valid_handle(handle)
    }

    fn lookup_key(&self, key: &[u8]) -> Option<(EntryHandle, &V)> {
        if key.len() != self.core.nbytes_key() {
            return None;
        }
        let mut best: Option<(u32, &TernaryEntry<V>)> = None;
        for slot in self.core.live_slots() {
            let entry = self.core.entry(slot);
            if let Some((_, best_entry)) = best {
                if entry.priority <= best_entry.priority {
                    continue;
                }
            }
            if entry.matches(key) {
                best = Some((slot, entry));
            }
        }
        let (slot, entry) = best?;
        Some((EntryHandle::new(entry.version, slot), entry.value.as_ref()?))
    }

    fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for slot in self.core.live_slots() {
            let entry = self.core.entry(slot);
            if let Some(value) = entry.value.as_ref() {
                writeln!(
                    out,
                    "{}: {} &&& {} => {}",
                    slot,
                    HexBytes(&entry.key),
                    HexBytes(&entry.mask),
                    value
                )?;
            }
        }
        Ok(())
    }
}
