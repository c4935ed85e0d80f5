//! Load, validate, clean and aggregate a dataset from disk.

mod common;

use common::{csv_text, write_csv, SAMPLE_ROWS};
use dbd::aggregate::{group_sum, growth_rate, total_and_mean, Field};
use dbd::record::columns;
use dbd::schema::{clean, load_and_validate, validate_structure, Validated};
use dbd::storage::{CsvStore, DatasetStore, OpenStore, StorageError};
use dbd::{ChartData, ChartRequest, Dataset};
use std::collections::HashSet;

const MESSY_ROWS: &[&str] = &[
    "1,32,JAWA BARAT,3201,KAB. BOGOR, 100 ,KASUS,2021",
    "1,32,JAWA BARAT,3201,KAB. BOGOR,100,KASUS,2021",
    "2,32,JAWA BARAT,3202,KAB. SUKABUMI,-5,KASUS,2021",
    "3,32,JAWA BARAT,3203,KAB. CIANJUR,,KASUS,2021",
    "4,32,JAWA BARAT,3204,KAB. BANDUNG,abc,KASUS,2021",
    "5,32,JAWA BARAT,3205,KAB. GARUT,12.0,KASUS,2021.0",
];

#[test]
fn clean_is_idempotent_and_drops_bad_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "messy.csv", &csv_text(MESSY_ROWS));
    let raw = CsvStore::open(&path).unwrap().load_raw().unwrap();

    let once = clean(&raw);
    let twice = clean(&once);
    assert_eq!(once, twice);

    // trimmed duplicate, negative, blank and non-numeric rows are gone
    assert_eq!(once.len(), 2);
    let unique: HashSet<_> = once.rows().iter().collect();
    assert_eq!(unique.len(), once.len());

    let dataset = Dataset::from_raw(&once).unwrap();
    assert!(dataset.iter().all(|r| r.case_count >= 0.0));
    let garut = dataset.iter().find(|r| r.region_code == "3205").unwrap();
    assert_eq!(garut.year, 2021);
    assert_eq!(garut.case_count, 12.0);
}

#[test]
fn growth_rate_guards_zero_start() {
    assert_eq!(growth_rate(&[100.0, 150.0]), 50.0);
    assert_eq!(growth_rate(&[0.0, 50.0]), 0.0);
}

#[test]
fn grouped_totals_equal_overall_total() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "data.csv", &csv_text(SAMPLE_ROWS));
    let dataset = CsvStore::open(&path).unwrap().load().unwrap().dataset;

    let (total, _) = total_and_mean(&dataset);
    assert_eq!(total, 340.0);
    for by in [Field::Year, Field::RegionCode, Field::ProvinceName] {
        assert_eq!(group_sum(&dataset, &[by]).total(), total);
    }
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::open(dir.path().join("absent.csv")).unwrap();
    assert!(matches!(store.load(), Err(StorageError::NotFound(_))));
    assert!(matches!(load_and_validate(&store), Err(StorageError::NotFound(_))));
}

#[test]
fn missing_column_fails_structure_check() {
    let dir = tempfile::tempdir().unwrap();
    let text = "kode_provinsi,nama_provinsi,kode_kabupaten_kota,nama_kabupaten_kota,satuan,tahun\n\
                32,JAWA BARAT,3201,KAB. BOGOR,KASUS,2021\n";
    let path = write_csv(dir.path(), "data.csv", text);
    let store = CsvStore::open(&path).unwrap();

    let report = validate_structure(&store.load_raw().unwrap());
    assert!(!report.ok);
    assert!(report.messages.iter().any(|m| m.contains(columns::CASE_COUNT)));

    match load_and_validate(&store).unwrap() {
        Validated::Invalid { errors, .. } => assert!(errors.iter().any(|m| m.contains(columns::CASE_COUNT))),
        Validated::Clean { .. } => panic!("dataset without case counts validated"),
    }
}

#[test]
fn valid_file_loads_clean_with_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "data.csv", &csv_text(SAMPLE_ROWS));
    let store = CsvStore::open(&path).unwrap();

    let validated = load_and_validate(&store).unwrap();
    let Validated::Clean { dataset, version, .. } = validated else {
        panic!("sample did not validate");
    };
    assert_eq!(dataset.len(), 4);
    assert_eq!(version, store.current_version().unwrap());
}

#[test]
fn charts_from_stored_data_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "data.csv", &csv_text(SAMPLE_ROWS));
    let dataset = CsvStore::open(&path).unwrap().load().unwrap().dataset;

    let heatmap = ChartRequest::Heatmap { province: None, top_n: 1 }.build(&dataset);
    let ChartData::Heatmap { table, .. } = &heatmap else {
        panic!("expected heatmap");
    };
    assert_eq!(table.row_labels.len(), 1);
    assert_eq!(table.values[0], vec![100.0, 150.0]);

    let json = serde_json::to_value(&heatmap).unwrap();
    assert_eq!(json["chart"], "heatmap");
    assert_eq!(json["table"]["column_labels"][0], 2021);
}
