//! # flowtab core
//!
//! Fundamental types shared by every match-unit discipline: match key
//! parameters and their canonicalization into fixed-width byte strings,
//! the public entry-handle codec, slot allocation, and the error taxonomy.
//!
//! ## Relations of important structs
//! ```text
//! [MatchKeyParam] --(build_*_key)--> canonical key (+ mask / prefix length)
//!
//! HandleAllocator --(acquire/release)--> slot
//!        slot + version <--(codec)--> EntryHandle
//! ```
//!
//! ## Example
//! ```
//! use flowtab_core::prelude::*;
//!
//! let params = [
//!     MatchKeyParam::exact([0xaa]),
//!     MatchKeyParam::valid(true),
//!     MatchKeyParam::exact([0xbb]),
//! ];
//! // VALID parameters always lead the canonical key.
//! let key = build_exact_key(&params, 3).unwrap();
//! assert_eq!(key, vec![0x01, 0xaa, 0xbb]);
//! ```

pub mod error;
pub mod handle;
pub mod key;

pub use crate::{
    error::{MatchError, MatchResult},
    handle::{EntryHandle, HandleAllocator},
    key::{KeyExtractor, MatchKeyParam, MatchKeyType, RawKeyExtractor},
};

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        error::{MatchError, MatchResult},
        handle::{EntryHandle, HandleAllocator},
        key::{
            build_exact_key, build_lpm_key, build_ternary_key, mask_from_prefix_len, HexBytes,
            KeyExtractor, MatchKeyParam, MatchKeyType, RawKeyExtractor,
        },
    };
}
