use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace1},
    combinator::{all_consuming, map, opt},
    error::{ErrorKind, ParseError},
    multi::many1,
    sequence::{preceded, separated_pair, tuple},
    IResult,
};

use flowtab_core::key::MatchKeyParam;

use crate::{
    basic::parser::{parse_hex_bytes, parse_i32, parse_ident, parse_ipv4_dotted, parse_u32},
    TableLoader,
};

/// One parsed `entry` line: the match key parameters, the entry priority
/// (0 when the line carries no `prio` clause), and the action value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    pub params: Vec<MatchKeyParam>,
    pub priority: i32,
    pub value: u32,
}

/// One parsed `table` block: the declared key width and its entries in
/// file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub nbytes_key: usize,
    pub entries: Vec<EntrySpec>,
}

/// Loader for the default table file format.
///
/// ```text
/// # key width in bytes follows the table name
/// table ipv4_lpm 4
/// entry 192.168.1.0/24 => 2
/// entry 0xc0a80000/16 => 1
///
/// table acl 2
/// entry 0x1200&&&0xff00 prio 10 => 7
/// entry valid 0xab prio 5 => 3
/// ```
///
/// `#` starts a comment, blank lines are skipped, and a repeated `table`
/// line re-opens the table so later entries append to it.
#[derive(Debug, Default)]
pub struct DefaultTableLoader;

impl TableLoader for DefaultTableLoader {
    fn _load<'x, Err: ParseError<&'x str>>(
        &self,
        content: &'x str,
    ) -> IResult<(), IndexMap<String, TableSpec>, Err> {
        let mut tables: IndexMap<String, TableSpec> = IndexMap::new();
        let mut current: Option<String> = None;
        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("table") {
                let (_, (name, nbytes_key)) = all_consuming(parse_table_line)(line)?;
                tables.entry(name.clone()).or_insert_with(|| TableSpec {
                    name: name.clone(),
                    nbytes_key,
                    entries: Vec::new(),
                });
                current = Some(name);
            } else if line.starts_with("entry") {
                let (_, entry) = all_consuming(parse_entry_line)(line)?;
                let name = current
                    .as_ref()
                    .ok_or_else(|| nom::Err::Error(Err::from_error_kind(line, ErrorKind::Tag)))?;
                if let Some(table) = tables.get_mut(name) {
                    table.entries.push(entry);
                }
            } else {
                return Err(nom::Err::Error(Err::from_error_kind(line, ErrorKind::Tag)));
            }
        }
        Ok(((), tables))
    }
}

/// r"table <ident> <nbytes>"
fn parse_table_line<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (String, usize), E> {
    let (rest, _) = tag("table")(input)?;
    let (rest, name) = preceded(multispace1, parse_ident)(rest)?;
    let (rest, nbytes) = preceded(multispace1, parse_u32)(rest)?;
    Ok((rest, (name.to_owned(), nbytes as usize)))
}

/// r"entry <param>+ [prio <n>] => <value>"
fn parse_entry_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, EntrySpec, E> {
    let (rest, _) = tag("entry")(input)?;
    let (rest, params) = many1(preceded(multispace1, parse_param))(rest)?;
    let (rest, priority) = opt(preceded(
        tuple((multispace1, tag("prio"), multispace1)),
        parse_i32,
    ))(rest)?;
    let (rest, value) = preceded(tuple((multispace1, tag("=>"), multispace1)), parse_u32)(rest)?;
    Ok((
        rest,
        EntrySpec {
            params,
            priority: priority.unwrap_or(0),
            value,
        },
    ))
}

fn parse_param<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, MatchKeyParam, E> {
    alt((
        parse_valid_param,
        parse_ternary_param,
        parse_lpm_param,
        parse_exact_param,
    ))(input)
}

/// r"(valid)(invalid)", the one-byte header-validity flag
fn parse_valid_param<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, MatchKeyParam, E> {
    alt((
        map(tag("invalid"), |_| MatchKeyParam::valid(false)),
        map(tag("valid"), |_| MatchKeyParam::valid(true)),
    ))(input)
}

/// r"<hex>&&&<hex>"
fn parse_ternary_param<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, MatchKeyParam, E> {
    map(
        separated_pair(parse_hex_bytes, tag("&&&"), parse_hex_bytes),
        |(key, mask)| MatchKeyParam::ternary(key, mask),
    )(input)
}

/// r"(<hex>)(<dotted ipv4>)/<prefix length>"
fn parse_lpm_param<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, MatchKeyParam, E> {
    let (rest, bytes) = alt((
        parse_hex_bytes,
        map(parse_ipv4_dotted, |ip| ip.to_be_bytes().to_vec()),
    ))(input)?;
    let (rest, prefix_length) = preceded(char('/'), parse_u32)(rest)?;
    Ok((rest, MatchKeyParam::lpm(bytes, prefix_length)))
}

/// r"<hex>"
fn parse_exact_param<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, MatchKeyParam, E> {
    map(parse_hex_bytes, MatchKeyParam::exact)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = r#"
    # two tables over different key widths
    table ipv4_lpm 4
    entry 192.168.1.0/24 => 2
    entry 0xc0a80000/16 => 1

    table acl 2
    entry 0x1200&&&0xff00 prio 10 => 7
    entry valid 0xab prio 5 => 3
    "#;

    #[test]
    fn test_load_tables() {
        let loader = DefaultTableLoader;
        let tables = loader.load(CONTENT).unwrap();
        assert_eq!(tables.len(), 2);

        let lpm = &tables["ipv4_lpm"];
        assert_eq!(lpm.nbytes_key, 4);
        assert_eq!(lpm.entries.len(), 2);
        assert_eq!(
            lpm.entries[0],
            EntrySpec {
                params: vec![MatchKeyParam::lpm([0xc0, 0xa8, 0x01, 0x00], 24)],
                priority: 0,
                value: 2,
            }
        );

        let acl = &tables["acl"];
        assert_eq!(acl.entries[0].priority, 10);
        assert_eq!(
            acl.entries[0].params,
            vec![MatchKeyParam::ternary([0x12, 0x00], [0xff, 0x00])]
        );
        assert_eq!(
            acl.entries[1].params,
            vec![MatchKeyParam::valid(true), MatchKeyParam::exact([0xab])]
        );
    }

    #[test]
    fn test_tables_keep_file_order() {
        let loader = DefaultTableLoader;
        let tables = loader.load(CONTENT).unwrap();
        let names: Vec<_> = tables.keys().cloned().collect();
        assert_eq!(names, vec!["ipv4_lpm", "acl"]);
    }

    #[test]
    fn test_entry_before_table_is_rejected() {
        let loader = DefaultTableLoader;
        assert!(loader.load("entry 0xab => 1").is_err());
    }

    #[test]
    fn test_unknown_line_is_rejected() {
        let loader = DefaultTableLoader;
        assert!(loader.load("table t 1\nflush t").is_err());
    }

    #[test]
    fn test_odd_hex_is_rejected() {
        let loader = DefaultTableLoader;
        assert!(loader.load("table t 2\nentry 0xabc => 1").is_err());
    }

    #[test]
    fn test_reopened_table_appends() {
        let content = "table t 1\nentry 0xaa => 1\ntable t 1\nentry 0xbb => 2";
        let loader = DefaultTableLoader;
        let tables = loader.load(content).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables["t"].entries.len(), 2);
    }
}
