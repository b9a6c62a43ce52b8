//! Longest-prefix matching over a bitwise trie.

use std::{fmt::Display, io};

use tracing::trace;

use flowtab_core::{
    error::{MatchError, MatchResult},
    handle::EntryHandle,
    key::{self, HexBytes, KeyExtractor, MatchKeyParam},
};
use flowtab_trie::PrefixTrie;

use crate::{
    unit::{with_scratch_key, SlotEntry, UnitCore},
    MatchUnit,
};

#[derive(Debug)]
pub(crate) struct LpmEntry<V> {
    key: Vec<u8>,
    prefix_length: u32,
    value: Option<V>,
    version: u32,
}

impl<V> Default for LpmEntry<V> {
    fn default() -> Self {
        LpmEntry {
            key: Vec::new(),
            prefix_length: 0,
            value: None,
            version: 0,
        }
    }
}

impl<V> SlotEntry for LpmEntry<V> {
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

/// Match unit that selects the entry with the longest installed prefix of
/// the lookup key.
///
/// Leading VALID and EXACT bytes are part of the effective prefix, so they
/// are matched bit for bit; only the trailing LPM bits are wildcarded.
/// Installing a `(key, prefix_length)` pair that is already present is
/// rejected with [`MatchError::DuplicateEntry`].
pub struct MatchUnitLpm<V, K> {
    core: UnitCore<LpmEntry<V>>,
    entries_trie: PrefixTrie<u32>,
    extractor: K,
}

impl<V: Display, K: KeyExtractor> MatchUnitLpm<V, K> {
    /// Creates a unit for `nbytes_key`-byte keys with a fixed `capacity`.
    pub fn new(nbytes_key: usize, capacity: usize, extractor: K) -> Self {
        MatchUnitLpm {
            core: UnitCore::new(nbytes_key, capacity),
            entries_trie: PrefixTrie::new(),
            extractor,
        }
    }

    /// Looks up the entry matching the key extracted from `header`.
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

impl<V: Display, K: KeyExtractor> MatchUnit<V> for MatchUnitLpm<V, K> {
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
        _priority: i32,
    ) -> MatchResult<EntryHandle> {
        let (new_key, prefix_length) = key::build_lpm_key(params, self.core.nbytes_key())?;
        if self.entries_trie.get(&new_key, prefix_length).is_some() {
            return Err(MatchError::DuplicateEntry);
        }
        let (slot, version) = self.core.reserve()?;
        self.entries_trie.insert(&new_key, prefix_length, slot);
        let entry = self.core.entry_mut(slot);
        entry.key = new_key;
        entry.prefix_length = prefix_length;
        entry.value = Some(value);
        trace!(
            slot,
            version,
            prefix_length,
            key = %HexBytes(&entry.key),
            "installed lpm entry"
        );
        Ok(EntryHandle::new(version, slot))
    }

    fn delete_entry(&mut self, handle: EntryHandle) -> MatchResult<()> {
        let slot = self.core.checked_slot(handle)?;
        let entry = self.core.entry_mut(slot);
        // version first: a racing reader sees a stale version or a dead slot
        entry.retire();
        let old_key = std::mem::take(&mut entry.key);
        let prefix_length = entry.prefix_length;
        if self.entries_trie.remove(&old_key, prefix_length).is_none() {
            return Err(MatchError::internal("lpm index lost a live prefix"));
        }
        trace!(slot, prefix_length, key = %HexBytes(&old_key), "deleted lpm entry");
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
        let slot = *self.entries_trie.lookup(key)?;
        let entry = self.core.entry(slot);
        Some((EntryHandle::new(entry.version, slot), entry.value.as_ref()?))
    }

    fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for slot in self.core.live_slots() {
            let entry = self.core.entry(slot);
            if let Some(value) = entry.value.as_ref() {
                writeln!(
                    out,
                    "{}: {}/{} => {}",
                    slot,
                    HexBytes(&entry.key),
                    entry.prefix_length,
                    value
                )?;
            }
        }
        Ok(())
    }
}
