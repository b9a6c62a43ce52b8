use flowtab_core::prelude::*;
use flowtab_io::prelude::*;
use flowtab_unit::prelude::*;

fn exact_unit(capacity: usize) -> MatchUnitExact<u32, RawKeyExtractor> {
    MatchUnitExact::new(2, capacity, RawKeyExtractor)
}

#[test]
fn test_expired_handle_after_delete() {
    let mut unit = exact_unit(4);
    let h1 = unit
        .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 1, 0)
        .unwrap();
    unit.delete_entry(h1).unwrap();

    // the slot is dead until the key is reinstalled
    assert_eq!(unit.get_value(h1), Err(MatchError::InvalidHandle));

    let h2 = unit
        .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 2, 0)
        .unwrap();
    assert_eq!(h2.slot(), h1.slot());
    assert!(h2.version() > h1.version());

    // the slot is live again, so the stale handle fails the version check
    assert_eq!(unit.get_value(h1), Err(MatchError::ExpiredHandle));
    assert_eq!(unit.modify_entry(h1, 9), Err(MatchError::ExpiredHandle));
    assert_eq!(unit.delete_entry(h1), Err(MatchError::ExpiredHandle));
    assert_eq!(unit.get_value(h2), Ok(&2));
}

#[test]
fn test_table_full_then_retry() {
    let mut unit = exact_unit(2);
    let h1 = unit
        .add_entry(&[MatchKeyParam::exact([0x00, 0x01])], 1, 0)
        .unwrap();
    unit.add_entry(&[MatchKeyParam::exact([0x00, 0x02])], 2, 0)
        .unwrap();
    assert_eq!(
        unit.add_entry(&[MatchKeyParam::exact([0x00, 0x03])], 3, 0),
        Err(MatchError::TableFull)
    );
    assert!(MatchError::TableFull.is_retryable());

    unit.delete_entry(h1).unwrap();
    unit.add_entry(&[MatchKeyParam::exact([0x00, 0x03])], 3, 0)
        .unwrap();
    assert_eq!(unit.num_entries(), 2);
}

#[test]
fn test_num_entries_tracks_live_handles() {
    let mut unit = MatchUnitTernary::<u32, _>::new(2, 8, RawKeyExtractor);
    let mut handles = Vec::new();
    for i in 0..6u8 {
        let h = unit
            .add_entry(
                &[MatchKeyParam::ternary([i, 0x00], [0xff, 0x00])],
                i as u32,
                i as i32,
            )
            .unwrap();
        handles.push(h);
    }
    assert_eq!(unit.num_entries(), handles.len());

    for h in handles.drain(..3) {
        unit.delete_entry(h).unwrap();
    }
    assert_eq!(unit.num_entries(), handles.len());
    assert!(handles.iter().all(|&h| unit.valid_handle(h)));
}

#[test]
fn test_version_strictly_increases_on_reuse() {
    let mut unit = MatchUnitLpm::<u32, _>::new(2, 1, RawKeyExtractor);
    let params = [MatchKeyParam::lpm([0xc0, 0x00], 8)];
    let mut last = unit.add_entry(&params, 0, 0).unwrap();
    for round in 1..5u32 {
        unit.delete_entry(last).unwrap();
        let next = unit.add_entry(&params, round, 0).unwrap();
        assert_eq!(next.slot(), last.slot());
        assert!(next.version() > last.version());
        last = next;
    }
}

#[test]
fn test_modify_is_visible_to_lookup() {
    let mut unit = exact_unit(4);
    let h = unit
        .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 1, 0)
        .unwrap();
    unit.modify_entry(h, 42).unwrap();
    assert_eq!(unit.lookup(&[0xab, 0xcd][..]), Some((h, &42)));
    assert_eq!(unit.get_value(h), Ok(&42));
}

#[test]
fn test_valid_handle_lifecycle() {
    let mut unit = exact_unit(4);
    let h = unit
        .add_entry(&[MatchKeyParam::exact([0xab, 0xcd])], 1, 0)
        .unwrap();
    assert!(unit.valid_handle(h));
    assert!(!unit.valid_handle(EntryHandle::new(h.version() + 1, h.slot())));
    assert!(!unit.valid_handle(EntryHandle::new(h.version(), h.slot() + 1)));

    unit.delete_entry(h).unwrap();
    assert!(!unit.valid_handle(h));
}

#[test]
fn test_misordered_extractor_misses() {
    let mut unit = MatchUnitExact::<u32, _>::new(3, 4, RawKeyExtractor);
    unit.add_entry(
        &[
            MatchKeyParam::exact([0xaa]),
            MatchKeyParam::valid(true),
            MatchKeyParam::exact([0xbb]),
        ],
        1,
        0,
    )
    .unwrap();

    // the canonical key leads with the VALID byte
    assert!(unit.lookup(&[0x01, 0xaa, 0xbb][..]).is_some());
    // an extractor that emits input order instead does not match
    assert!(unit.lookup(&[0xaa, 0x01, 0xbb][..]).is_none());
}

struct TwoFieldHeader {
    proto: u8,
    port: u16,
}

struct TwoFieldExtractor;

impl KeyExtractor for TwoFieldExtractor {
    type Header = TwoFieldHeader;

    fn extract(&self, header: &TwoFieldHeader, key: &mut Vec<u8>) {
        key.push(header.proto);
        key.extend_from_slice(&header.port.to_be_bytes());
    }
}

#[test]
fn test_lookup_through_a_header_extractor() {
    let mut unit = MatchUnitExact::<u32, _>::new(3, 4, TwoFieldExtractor);
    let h = unit
        .add_entry(
            &[MatchKeyParam::exact([0x06]), MatchKeyParam::exact([0x00, 0x50])],
            1,
            0,
        )
        .unwrap();

    let http = TwoFieldHeader {
        proto: 6,
        port: 80,
    };
    assert_eq!(unit.lookup(&http), Some((h, &1)));

    let dns = TwoFieldHeader {
        proto: 17,
        port: 53,
    };
    assert_eq!(unit.lookup(&dns), None);
}

const TABLE_FILE: &str = r#"
table ipv4_lpm 4
entry 192.168.1.0/24 => 2
entry 0xc0a80000/16 => 1

table acl 2
entry 0x1200&&&0xff00 prio 10 => 7
entry valid 0xab prio 5 => 3
"#;

fn install(unit: &mut dyn MatchUnit<u32>, spec: &TableSpec) {
    assert_eq!(unit.nbytes_key(), spec.nbytes_key);
    for entry in &spec.entries {
        unit.add_entry(&entry.params, entry.value, entry.priority)
            .unwrap();
    }
}

#[test]
fn test_loaded_tables_drive_lookups() {
    let tables = DefaultTableLoader.load(TABLE_FILE).unwrap();

    let mut lpm = MatchUnitLpm::<u32, _>::new(4, 8, RawKeyExtractor);
    install(&mut lpm, &tables["ipv4_lpm"]);
    assert_eq!(lpm.lookup(&[192, 168, 1, 5][..]).map(|(_, v)| *v), Some(2));
    assert_eq!(
        lpm.lookup(&[192, 168, 200, 1][..]).map(|(_, v)| *v),
        Some(1)
    );
    assert_eq!(lpm.lookup(&[10, 0, 0, 1][..]), None);

    let mut acl = MatchUnitTernary::<u32, _>::new(2, 8, RawKeyExtractor);
    install(&mut acl, &tables["acl"]);
    assert_eq!(acl.lookup(&[0x12, 0x99][..]).map(|(_, v)| *v), Some(7));
    assert_eq!(acl.lookup(&[0x01, 0xab][..]).map(|(_, v)| *v), Some(3));
    assert_eq!(acl.lookup(&[0x02, 0xab][..]), None);
}
