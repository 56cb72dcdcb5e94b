use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use tb_delay_synthesis::models::panel::fields;
use tb_delay_synthesis::utils::io::parquet::write_parquet;
use tb_delay_synthesis::{
    BatchAdapter, DelayBatchAdapter, DelayCategory, DelayRecordStore, PanelBatchAdapter,
    RecordBatch, SynthesisPipeline, VarianceImputation, read_parquet_path,
};

use crate::utils::fast_config;

fn delay_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("pmid", DataType::Int64, true),
        Field::new("state", DataType::Utf8, true),
        Field::new("study_year", DataType::Int32, true),
        Field::new("sample_size", DataType::Float64, true),
        Field::new("patient_delay_days", DataType::Float64, true),
        Field::new("patient_delay_se", DataType::Float64, true),
        Field::new("total_delay_days", DataType::Float64, true),
        Field::new("total_delay_sd", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![Some(31_245_001), Some(31_245_002), None])),
        Arc::new(StringArray::from(vec![Some("Bihar"), None, Some("Kerala")])),
        Arc::new(Int32Array::from(vec![Some(2019), Some(2021), None])),
        Arc::new(Float64Array::from(vec![Some(120.0), Some(80.0), Some(45.0)])),
        Arc::new(Float64Array::from(vec![Some(24.0), None, Some(31.0)])),
        Arc::new(Float64Array::from(vec![Some(3.0), None, None])),
        Arc::new(Float64Array::from(vec![Some(55.0), Some(61.0), None])),
        Arc::new(Float64Array::from(vec![None, Some(20.0), None])),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

fn panel_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("state", DataType::Utf8, true),
        Field::new("year", DataType::Int64, true),
        Field::new(fields::POPULATION, DataType::Int64, true),
        Field::new(fields::HOUSEHOLDS, DataType::Float64, true),
        Field::new(fields::LITERACY_PCT, DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![Some("Bihar"), Some("Kerala"), None, Some("Goa")])),
        Arc::new(Int64Array::from(vec![2024, 2024, 2024, 2023])),
        Arc::new(Int64Array::from(vec![Some(104_099_452), Some(33_406_061), Some(1), Some(1_458_545)])),
        Arc::new(Float64Array::from(vec![Some(1.9e7), Some(7.7e6), Some(1.0), Some(3.2e5)])),
        Arc::new(Float64Array::from(vec![Some(61.8), Some(94.0), None, None])),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

#[test]
fn test_delay_rows_become_records() {
    let records = DelayBatchAdapter::new().from_record_batch(&delay_batch()).unwrap();
    assert_eq!(records.len(), 4);

    let patient: Vec<_> = records
        .iter()
        .filter(|r| r.category == DelayCategory::Patient)
        .collect();
    assert_eq!(patient.len(), 2);
    assert_eq!(patient[0].study_id, "31245001");
    assert_eq!(patient[0].standard_error, Some(3.0));
    assert_eq!(patient[0].state.as_deref(), Some("Bihar"));
    assert_eq!(patient[0].year, Some(2019));
    assert_eq!(patient[1].study_id, "row-2");

    let total: Vec<_> = records
        .iter()
        .filter(|r| r.category == DelayCategory::Total)
        .collect();
    assert_eq!(total[1].standard_deviation, Some(20.0));
    assert_eq!(total[1].sample_size, Some(80.0));

    let store = DelayRecordStore::from_raw(&records, &VarianceImputation::default()).unwrap();
    assert_eq!(store.len(), 4);
    // SD 20 over sqrt(80)
    let derived = store.by_category(DelayCategory::Total)[1].variance;
    assert!((derived - 400.0 / 80.0).abs() < 1e-12);
}

#[test]
fn test_panel_rows_become_records() {
    let rows = PanelBatchAdapter::new().from_record_batch(&panel_batch()).unwrap();
    assert_eq!(rows.len(), 3);

    let bihar = &rows[0];
    assert_eq!(bihar.state, "Bihar");
    assert_eq!(bihar.year, Some(2024));
    assert_eq!(bihar.get(fields::POPULATION), Some(104_099_452.0));
    assert!(!bihar.has("year"));

    let goa = &rows[2];
    assert!(!goa.has(fields::LITERACY_PCT));
}

#[test]
fn test_parquet_round_trip_into_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let delays = dir.path().join("delays.parquet");
    let panel = dir.path().join("panel").join("2024.parquet");
    write_parquet(&delays, &[delay_batch()]).unwrap();
    write_parquet(&panel, &[panel_batch()]).unwrap();

    let delay_batches = read_parquet_path(&delays).unwrap();
    let records = DelayBatchAdapter::new()
        .from_record_batches(&delay_batches)
        .unwrap();
    let store = DelayRecordStore::from_raw(&records, &VarianceImputation::default()).unwrap();

    let panel_batches = read_parquet_path(&dir.path().join("panel")).unwrap();
    let rows = PanelBatchAdapter::new()
        .from_record_batches(&panel_batches)
        .unwrap();
    assert_eq!(rows.len(), 3);

    let report = SynthesisPipeline::new(fast_config())
        .without_backend()
        .run(&store, &rows)
        .unwrap();
    assert_eq!(report.estimates.len(), 2);
    assert_eq!(report.scores.len(), 3);
}

#[test]
fn test_batch_without_delay_columns() {
    let schema = Arc::new(Schema::new(vec![Field::new("pmid", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1_i64]))]).unwrap();
    assert!(DelayBatchAdapter::new().from_record_batch(&batch).is_err());
}
