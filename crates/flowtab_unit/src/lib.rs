//! # flowtab unit
//!
//! Match units for a programmable switch pipeline. A unit stores
//! classification entries over a fixed-width byte key and, given a packet's
//! extracted key, selects at most one entry according to its discipline:
//!
//! - [`MatchUnitExact`]: byte equality, hash-indexed.
//! - [`MatchUnitLpm`]: longest prefix of bits, trie-indexed.
//! - [`MatchUnitTernary`]: masked equality with priorities, linear scan.
//!
//! ## Relations of important structs
//! ```text
//!               MatchKeyParam sequence
//!                        |
//!                  (build_*_key)
//!                        v
//! control plane -> MatchUnit{Exact,Lpm,Ternary} <- KeyExtractor <- data plane
//!                        |
//!                        v
//!              (EntryHandle, value) | miss
//! ```
//!
//! Entries are owned by the unit and referenced through versioned
//! [`EntryHandle`]s; a handle issued before a delete (or a
//! delete-then-reinsert on the same slot) fails the version check instead
//! of silently reading the wrong entry.
//!
//! ## Example
//! ```
//! use flowtab_core::prelude::*;
//! use flowtab_unit::prelude::*;
//!
//! let mut unit = MatchUnitExact::new(2, 4, RawKeyExtractor);
//! let h = unit
//!     .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 7u32, 0)
//!     .unwrap();
//! assert_eq!(unit.lookup(&[0xab, 0xcd][..]), Some((h, &7)));
//! assert_eq!(unit.lookup(&[0xab, 0xce][..]), None);
//! ```

mod exact;
mod lpm;
mod ternary;
mod unit;

use std::{fmt::Display, io};

use flowtab_core::{error::MatchResult, handle::EntryHandle, key::MatchKeyParam};

pub use {exact::MatchUnitExact, lpm::MatchUnitLpm, ternary::MatchUnitTernary};

/// Control-plane surface shared by the three match disciplines.
///
/// `priority` is honored by the ternary discipline and ignored by exact and
/// lpm. Every mutating or reading operation applies the same handle-check
/// protocol: decode the slot, require liveness, require the version
/// embedded in the handle to match the slot's current version.
pub trait MatchUnit<V: Display> {
    /// Fixed width of the canonical match key in bytes.
    fn nbytes_key(&self) -> usize;

    /// Fixed number of entry slots.
    fn capacity(&self) -> usize;

    /// Number of installed entries.
    fn num_entries(&self) -> usize;

    /// Canonicalizes `params`, reserves a slot, and installs the entry.
    fn add_entry(
        &mut self,
        params: &[MatchKeyParam],
        value: V,
        priority: i32,
    ) -> MatchResult<EntryHandle>;

    /// Uninstalls the entry, invalidating every handle issued for it.
    fn delete_entry(&mut self, handle: EntryHandle) -> MatchResult<()>;

    /// Replaces the entry's value in place; key, priority, and version are
    /// unchanged.
    fn modify_entry(&mut self, handle: EntryHandle, value: V) -> MatchResult<()>;

    /// Borrows the entry's value.
    fn get_value(&self, handle: EntryHandle) -> MatchResult<&V>;

    /// True iff the handle's slot is live and its version matches.
    fn valid_handle(&self, handle: EntryHandle) -> bool;

    /// Looks up an already-built canonical key.
    ///
    /// The returned borrow is valid until the next mutation of the unit.
    fn lookup_key(&self, key: &[u8]) -> Option<(EntryHandle, &V)>;

    /// Writes one `slot: key => value` line per live entry, in ascending
    /// slot order.
    fn dump(&self, out: &mut dyn io::Write) -> io::Result<()>;
}

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{MatchUnit, MatchUnitExact, MatchUnitLpm, MatchUnitTernary};
}
