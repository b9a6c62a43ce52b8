//! This module provides parsing of the default control-plane table format
//! (.tbl files: `table` declaration lines followed by `entry` lines).
mod default;

use indexmap::IndexMap;
use nom::{
    error::{Error, ParseError},
    {Finish, IResult},
};

pub use default::{DefaultTableLoader, EntrySpec, TableSpec};

/// TableLoader parses control-plane table files into [`TableSpec`]s, which
/// carry everything a match unit needs to install the entries: the key
/// width, the match key parameters, the priority, and the action value.
///
/// ***The trait and the format are manufacture-specific.***
pub trait TableLoader {
    // Required method
    fn _load<'x, Err: ParseError<&'x str>>(
        &self,
        content: &'x str,
    ) -> IResult<(), IndexMap<String, TableSpec>, Err>;

    // Provided method
    fn load<'x>(&self, content: &'x str) -> Result<IndexMap<String, TableSpec>, Error<&'x str>> {
        let res = self._load(content).finish();
        match res {
            Ok((_, tables)) => Ok(tables),
            Err(e) => Err(e),
        }
    }
}

/// Basics for io
pub mod basic {
    /// Basic helper functions for parsing
    pub mod parser {
        use nom::bytes::complete::{tag, take_while1};
        use nom::character::complete::{char, digit1};
        use nom::character::is_alphanumeric;
        use nom::error::{ErrorKind, ParseError};
        use nom::sequence::{preceded, tuple};
        use nom::Err::Error;
        use nom::IResult;

        fn is_ident(chr: char) -> bool {
            is_alphanumeric(chr as u8) || chr == '_' || chr == '-' || chr == '.'
        }

        /// r"[a-zA-Z0-9_\-\.]+"
        pub fn parse_ident<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, &'a str, E> {
            take_while1(is_ident)(input)
        }

        /// r"[0-9]+"
        pub fn parse_digits<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, &'a str, E> {
            digit1(input)
        }

        /// r"[<=u32::MAX]"
        pub fn parse_u32<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u32, E> {
            let (rest, num) = digit1(input)?;
            if let Ok(num) = num.parse::<u32>() {
                Ok((rest, num))
            } else {
                Err(Error(E::from_error_kind(input, ErrorKind::Digit)))
            }
        }

        /// r"[<=i32::MAX]"
        pub fn parse_i32<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, i32, E> {
            let (rest, num) = digit1(input)?;
            if let Ok(num) = num.parse::<i32>() {
                Ok((rest, num))
            } else {
                Err(Error(E::from_error_kind(input, ErrorKind::Digit)))
            }
        }

        /// r"0x[0-9a-fA-F]{2n}", decoded to bytes
        pub fn parse_hex_bytes<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, Vec<u8>, E> {
            let (rest, digits) =
                preceded(tag("0x"), take_while1(|c: char| c.is_ascii_hexdigit()))(input)?;
            if digits.len() % 2 != 0 {
                return Err(Error(E::from_error_kind(input, ErrorKind::HexDigit)));
            }
            let bytes = (0..digits.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| Error(E::from_error_kind(input, ErrorKind::HexDigit)))?;
            Ok((rest, bytes))
        }

        /// r"[<=255].[<=255].[<=255].[<=255]"
        pub fn parse_ipv4_dotted<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, u32, E> {
            fn parse_u8<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u8, E> {
                let (rest, num) = digit1(input)?;
                if let Ok(num) = num.parse::<u8>() {
                    Ok((rest, num))
                } else {
                    Err(Error(E::from_error_kind(input, ErrorKind::Digit)))
                }
            }

            let (rest, (o1, _, o2, _, o3, _, o4)) = tuple((
                parse_u8,
                char('.'),
                parse_u8,
                char('.'),
                parse_u8,
                char('.'),
                parse_u8,
            ))(input)?;
            Ok((
                rest,
                (o1 as u32) << 24 | (o2 as u32) << 16 | (o3 as u32) << 8 | o4 as u32,
            ))
        }
    }
}

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{DefaultTableLoader, EntrySpec, TableLoader, TableSpec};
}
