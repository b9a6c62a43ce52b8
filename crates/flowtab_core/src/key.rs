//! Match key parameters and canonical key construction.
//!
//! A control-plane entry arrives as a sequence of [`MatchKeyParam`]s, one
//! per header field. Before storage the sequence is canonicalized into a
//! single fixed-width byte string, plus a mask or a prefix length where the
//! discipline calls for one. The byte layout is identical across
//! disciplines: VALID parameters emit first in input order, then the
//! remaining parameters in input order. The data-plane [`KeyExtractor`]
//! must produce the same layout, or installed entries will never match.

use std::fmt;

use crate::error::{MatchError, MatchResult};

/// Discipline-level kind of one match key parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKeyType {
    /// Byte-equal comparison over the full parameter width.
    Exact,
    /// Longest-prefix comparison; wildcards the trailing bits.
    Lpm,
    /// Masked comparison; any bit may be wildcarded.
    Ternary,
    /// One-byte header-validity flag, always emitted ahead of the rest.
    Valid,
}

/// One field of a control-plane match key.
///
/// `mask` is present iff the type is [`MatchKeyType::Ternary`];
/// `prefix_length` iff [`MatchKeyType::Lpm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKeyParam {
    /// Kind of comparison this field asks for.
    pub ty: MatchKeyType,
    /// Field value, big-endian byte order.
    pub key: Vec<u8>,
    /// Care-bit mask, same width as `key`.
    pub mask: Option<Vec<u8>>,
    /// Number of leading bits of `key` that must match.
    pub prefix_length: Option<u32>,
}

impl MatchKeyParam {
    /// Exact-match parameter.
    pub fn exact(key: impl Into<Vec<u8>>) -> Self {
        MatchKeyParam {
            ty: MatchKeyType::Exact,
            key: key.into(),
            mask: None,
            prefix_length: None,
        }
    }

    /// Longest-prefix parameter over the leading `prefix_length` bits.
    pub fn lpm(key: impl Into<Vec<u8>>, prefix_length: u32) -> Self {
        MatchKeyParam {
            ty: MatchKeyType::Lpm,
            key: key.into(),
            mask: None,
            prefix_length: Some(prefix_length),
        }
    }

    /// Ternary parameter with an explicit care-bit mask.
    pub fn ternary(key: impl Into<Vec<u8>>, mask: impl Into<Vec<u8>>) -> Self {
        MatchKeyParam {
            ty: MatchKeyType::Ternary,
            key: key.into(),
            mask: Some(mask.into()),
            prefix_length: None,
        }
    }

    /// Header-validity flag parameter.
    pub fn valid(is_valid: bool) -> Self {
        MatchKeyParam {
            ty: MatchKeyType::Valid,
            key: vec![is_valid as u8],
            mask: None,
            prefix_length: None,
        }
    }
}

/// Canonicalizes an exact match key.
///
/// Only EXACT and VALID parameters are admissible; the result must come out
/// at exactly `nbytes_key` bytes.
pub fn build_exact_key(params: &[MatchKeyParam], nbytes_key: usize) -> MatchResult<Vec<u8>> {
    let mut key = Vec::with_capacity(nbytes_key);
    for param in params {
        if param.ty == MatchKeyType::Valid {
            key.extend_from_slice(&param.key);
        }
    }
    for param in params {
        match param.ty {
            MatchKeyType::Exact => key.extend_from_slice(&param.key),
            MatchKeyType::Valid => {}
            MatchKeyType::Lpm => {
                return Err(MatchError::bad_match_key(
                    "lpm parameter is not allowed in an exact match key",
                ))
            }
            MatchKeyType::Ternary => {
                return Err(MatchError::bad_match_key(
                    "ternary parameter is not allowed in an exact match key",
                ))
            }
        }
    }
    check_width(&key, nbytes_key)?;
    Ok(key)
}

/// Canonicalizes a longest-prefix match key.
///
/// Exactly one LPM parameter is required; its bytes close the canonical key
/// so the wildcard only covers trailing bits. The returned prefix length is
/// the effective one: 8 bits for every leading VALID and EXACT byte plus
/// the LPM parameter's own prefix length.
pub fn build_lpm_key(
    params: &[MatchKeyParam],
    nbytes_key: usize,
) -> MatchResult<(Vec<u8>, u32)> {
    let mut key = Vec::with_capacity(nbytes_key);
    let mut prefix_length = 0u32;
    for param in params {
        if param.ty == MatchKeyType::Valid {
            key.extend_from_slice(&param.key);
            prefix_length += 8 * param.key.len() as u32;
        }
    }
    let mut lpm_param = None;
    for param in params {
        match param.ty {
            MatchKeyType::Exact => {
                key.extend_from_slice(&param.key);
                prefix_length += 8 * param.key.len() as u32;
            }
            MatchKeyType::Lpm => {
                if lpm_param.replace(param).is_some() {
                    return Err(MatchError::bad_match_key(
                        "more than one lpm parameter in an lpm match key",
                    ));
                }
            }
            MatchKeyType::Valid => {}
            MatchKeyType::Ternary => {
                return Err(MatchError::bad_match_key(
                    "ternary parameter is not allowed in an lpm match key",
                ))
            }
        }
    }
    let lpm_param = lpm_param
        .ok_or_else(|| MatchError::bad_match_key("no lpm parameter in an lpm match key"))?;
    let plen = param_prefix_length(lpm_param)?;
    key.extend_from_slice(&lpm_param.key);
    prefix_length += plen;
    check_width(&key, nbytes_key)?;
    Ok((key, prefix_length))
}

/// Canonicalizes a ternary match key and its mask.
///
/// Every parameter kind is admissible: EXACT and VALID contribute fully-set
/// mask bytes, LPM contributes a mask derived from its prefix length, and
/// TERNARY contributes its own mask.
pub fn build_ternary_key(
    params: &[MatchKeyParam],
    nbytes_key: usize,
) -> MatchResult<(Vec<u8>, Vec<u8>)> {
    let mut key = Vec::with_capacity(nbytes_key);
    let mut mask = Vec::with_capacity(nbytes_key);
    for param in params {
        if param.ty == MatchKeyType::Valid {
            key.extend_from_slice(&param.key);
            mask.extend(std::iter::repeat(0xff).take(param.key.len()));
        }
    }
    for param in params {
        match param.ty {
            MatchKeyType::Exact => {
                key.extend_from_slice(&param.key);
                mask.extend(std::iter::repeat(0xff).take(param.key.len()));
            }
            MatchKeyType::Lpm => {
                let plen = param_prefix_length(param)?;
                key.extend_from_slice(&param.key);
                mask.extend_from_slice(&mask_from_prefix_len(plen, param.key.len()));
            }
            MatchKeyType::Ternary => {
                let pmask = param.mask.as_deref().ok_or_else(|| {
                    MatchError::bad_match_key("ternary parameter is missing its mask")
                })?;
                if pmask.len() != param.key.len() {
                    return Err(MatchError::bad_match_key(format!(
                        "mask is {} bytes, parameter key is {}",
                        pmask.len(),
                        param.key.len()
                    )));
                }
                key.extend_from_slice(&param.key);
                mask.extend_from_slice(pmask);
            }
            MatchKeyType::Valid => {}
        }
    }
    check_width(&key, nbytes_key)?;
    check_width(&mask, nbytes_key)?;
    Ok((key, mask))
}

/// Mask with the `prefix_length` high-order bits set over an `nbytes` field.
///
/// `prefix_length` must not exceed `8 * nbytes`.
pub fn mask_from_prefix_len(prefix_length: u32, nbytes: usize) -> Vec<u8> {
    debug_assert!(prefix_length as usize <= 8 * nbytes);
    let mut mask = vec![0u8; nbytes];
    let full = (prefix_length / 8) as usize;
    for byte in &mut mask[..full] {
        *byte = 0xff;
    }
    if prefix_length % 8 != 0 {
        mask[full] = 0xff << (8 - prefix_length % 8);
    }
    mask
}

fn param_prefix_length(param: &MatchKeyParam) -> MatchResult<u32> {
    let plen = param
        .prefix_length
        .ok_or_else(|| MatchError::bad_match_key("lpm parameter is missing its prefix length"))?;
    if plen > 8 * param.key.len() as u32 {
        return Err(MatchError::bad_match_key(format!(
            "prefix length {} exceeds the {}-byte parameter width",
            plen,
            param.key.len()
        )));
    }
    Ok(plen)
}

fn check_width(bytes: &[u8], nbytes_key: usize) -> MatchResult<()> {
    if bytes.len() != nbytes_key {
        return Err(MatchError::bad_match_key(format!(
            "canonical key is {} bytes, table expects {}",
            bytes.len(),
            nbytes_key
        )));
    }
    Ok(())
}

/// The seam to the data plane: extracts a packet's lookup key from its
/// header-value view.
///
/// An implementation must append exactly the table's key width, in the same
/// byte order the canonical key builders produce, and must be deterministic
/// for a given header view.
pub trait KeyExtractor {
    /// Header-value view the extractor reads. External to this crate.
    type Header: ?Sized;

    /// Appends the lookup key for `header` to `key`.
    fn extract(&self, header: &Self::Header, key: &mut Vec<u8>);
}

/// Extractor for callers whose header view already is the canonical key.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawKeyExtractor;

impl KeyExtractor for RawKeyExtractor {
    type Header = [u8];

    #[inline]
    fn extract(&self, header: &[u8], key: &mut Vec<u8>) {
        key.extend_from_slice(header);
    }
}

/// Lowercase-hex display adapter for keys and masks.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
