//! Hash-keyed exact matching.

use std::{fmt::Display, io};

use fxhash::FxHashMap;
use tracing::trace;

use flowtab_core::{
    error::{MatchError, MatchResult},
    handle::EntryHandle,
    key::{self, HexBytes, KeyExtractor, MatchKeyParam},
};

use crate::{
    unit::{with_scratch_key, SlotEntry, UnitCore},
    MatchUnit,
};

#[derive(Debug)]
pub(crate) struct ExactEntry<V> {
    key: Vec<u8>,
    value: Option<V>,
    version: u32,
}

impl<V> Default for ExactEntry<V> {
    fn default() -> Self {
        ExactEntry {
            key: Vec::new(),
            value: None,
            version: 0,
        }
    }
}

impl<V> SlotEntry for ExactEntry<V> {
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

/// Match unit that selects entries by byte equality on the canonical key.
///
/// The index is a hash map from canonical key to slot, so lookups are O(1)
/// expected. Installing a key that is already present is rejected with
/// [`MatchError::DuplicateEntry`].
pub struct MatchUnitExact<V, K> {
    core: UnitCore<ExactEntry<V>>,
    entries_map: FxHashMap<Vec<u8>, u32>,
    extractor: K,
}

impl<V: Display, K: KeyExtractor> MatchUnitExact<V, K> {
    /// Creates a unit for `nbytes_key`-byte keys with a fixed `capacity`.
    pub fn new(nbytes_key: usize, capacity: usize, extractor: K) -> Self {
        MatchUnitExact {
            core: UnitCore::new(nbytes_key, capacity),
            entries_map: FxHashMap::default(),
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

impl<V: Display, K: KeyExtractor> MatchUnit<V> for MatchUnitExact<V, K> {
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
        let new_key = key::build_exact_key(params, self.core.nbytes_key())?;
        if self.entries_map.contains_key(&new_key) {
            return Err(MatchError::DuplicateEntry);
        }
        let (slot, version) = self.core.reserve()?;
        self.entries_map.insert(new_key.clone(), slot);
        let entry = self.core.entry_mut(slot);
        entry.key = new_key;
        entry.value = Some(value);
        trace!(slot, version, key = %HexBytes(&entry.key), "installed exact entry");
        Ok(EntryHandle::new(version, slot))
    }

    fn delete_entry(&mut self, handle: EntryHandle) -> MatchResult<()> {
        let slot = self.core.checked_slot(handle)?;
        let entry = self.core.entry_mut(slot);
        // version first: a racing reader sees a stale version or a dead slot
        entry.retire();
        let old_key = std::mem::take(&mut entry.key);
        self.entries_map.remove(&old_key);
        trace!(slot, key = %HexBytes(&old_key), "deleted exact entry");
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
        let slot = *self.entries_map.get(key)?;
        let entry = self.core.entry(slot);
        Some((EntryHandle::new(entry.version, slot), entry.value.as_ref()?))
    }

    fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for slot in self.core.live_slots() {
            let entry = self.core.entry(slot);
            if let Some(value) = entry.value.as_ref() {
                writeln!(out, "{}: {} => {}", slot, HexBytes(&entry.key), value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use flowtab_core::key::RawKeyExtractor;

    use super::*;

    fn unit(capacity: usize) -> MatchUnitExact<u32, RawKeyExtractor> {
        MatchUnitExact::new(2, capacity, RawKeyExtractor)
    }

    #[test]
    fn test_exact_hit_and_miss() {
        let mut unit = unit(4);
        let h1 = unit
            .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 1, 0)
            .unwrap();

        assert_eq!(unit.lookup(&[0xab, 0xcd][..]), Some((h1, &1)));
        assert_eq!(unit.lookup(&[0xab, 0xce][..]), None);
        assert_eq!(unit.num_entries(), 1);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut unit = unit(4);
        unit.add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 1, 0)
            .unwrap();
        assert_eq!(
            unit.add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 2, 0),
            Err(MatchError::DuplicateEntry)
        );
        // the first entry is untouched
        assert_eq!(unit.num_entries(), 1);
        assert_eq!(unit.lookup(&[0xab, 0xcd][..]).map(|(_, v)| *v), Some(1));
    }

    #[test]
    fn test_modify_then_get() {
        let mut unit = unit(4);
        let h = unit
            .add_entry(&[MatchKeyParam::exact([0x00, 0x01])], 1, 0)
            .unwrap();
        unit.modify_entry(h, 9).unwrap();
        assert_eq!(unit.get_value(h), Ok(&9));
        assert_eq!(unit.lookup(&[0x00, 0x01][..]), Some((h, &9)));
    }

    #[test]
    fn test_delete_clears_index() {
        let mut unit = unit(4);
        let h = unit
            .add_entry(&[MatchKeyParam::exact([0x00, 0x01])], 1, 0)
            .unwrap();
        unit.delete_entry(h).unwrap();
        assert_eq!(unit.lookup(&[0x00, 0x01][..]), None);
        assert_eq!(unit.num_entries(), 0);
        assert!(!unit.valid_handle(h));
    }

    #[test]
    fn test_bad_key_rejected_before_allocation() {
        let mut unit = unit(1);
        let err = unit
            .add_entry(&[MatchKeyParam::lpm([0xab], 4)], 1, 0)
            .unwrap_err();
        assert!(matches!(err, MatchError::BadMatchKey { .. }));
        assert_eq!(unit.num_entries(), 0);
    }

    #[test]
    fn test_dump_format() {
        let mut unit = unit(4);
        unit.add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 7, 0)
            .unwrap();
        let mut out = Vec::new();
        unit.dump(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0: abcd => 7\n");
    }
}
