use super::*;
use crate::config::{AcceleratorConfig, EngineConfig};
use crate::types::CompressionLevel;

fn sample_histogram() -> Histogram {
    let source = b"the quick brown fox jumps over the lazy dog, the quick brown fox".repeat(20);
    gather_deflate_statistics(
        &source,
        CompressionLevel::Default,
        ExecutionPath::Software,
        &EngineConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_histogram_fills_a_complete_deflate_table() {
    let mut table = HuffmanTable::create(
        TableKind::Compression,
        TableRepresentation::Deflate,
        ExecutionPath::Software,
    )
    .unwrap();
    assert!(!table.is_initialized());
    table.init_with_histogram(sample_histogram()).unwrap();

    assert_eq!(table.source(), TableSource::Histogram);
    let codes = table.deflate_codes().unwrap();
    // Every literal, length and distance symbol is encodable.
    assert!((0..286).all(|s| codes.litlen.has_code(s)));
    assert!((0..30).all(|s| codes.distance.has_code(s)));
    table.destroy().unwrap();
}

#[test]
fn test_decompression_table_mirrors_its_peer() {
    let mut compression = HuffmanTable::create(
        TableKind::Compression,
        TableRepresentation::HuffmanOnly,
        ExecutionPath::Software,
    )
    .unwrap();
    compression
        .init_with_histogram(gather_literal_statistics(b"aaaaaaaabbbbcc"))
        .unwrap();

    let mut decompression = HuffmanTable::create(
        TableKind::Decompression,
        TableRepresentation::HuffmanOnly,
        ExecutionPath::Software,
    )
    .unwrap();
    decompression.init_with_other(&compression).unwrap();

    assert_eq!(decompression.source(), TableSource::Peer);
    assert_eq!(decompression.codes, compression.codes);
    assert!(decompression.literal_decoder().is_ok());
    // A decompression table cannot drive compression.
    assert!(matches!(
        decompression.literal_codes(),
        Err(TableError::WrongKind { .. })
    ));
}

#[test]
fn test_misuse_is_reported_as_table_errors() {
    let mut decompression = HuffmanTable::create(
        TableKind::Decompression,
        TableRepresentation::Deflate,
        ExecutionPath::Software,
    )
    .unwrap();
    let err = decompression
        .init_with_histogram(sample_histogram())
        .unwrap_err();
    assert!(matches!(err, JobError::Table(TableError::WrongKind { .. })));

    let empty = HuffmanTable::create(
        TableKind::Compression,
        TableRepresentation::Deflate,
        ExecutionPath::Software,
    )
    .unwrap();
    let err = decompression.init_with_other(&empty).unwrap_err();
    assert!(matches!(err, JobError::Table(TableError::Uninitialized)));

    let mut literal = HuffmanTable::create(
        TableKind::Compression,
        TableRepresentation::HuffmanOnly,
        ExecutionPath::Software,
    )
    .unwrap();
    literal
        .init_with_histogram(gather_literal_statistics(b"xyz"))
        .unwrap();
    let err = decompression.init_with_other(&literal).unwrap_err();
    assert!(matches!(
        err,
        JobError::Table(TableError::WrongRepresentation { .. })
    ));

    let mut combined = HuffmanTable::create(
        TableKind::Combined,
        TableRepresentation::Deflate,
        ExecutionPath::Software,
    )
    .unwrap();
    assert!(matches!(
        combined.init_with_histogram(Histogram::new()),
        Err(JobError::Table(TableError::EmptyHistogram))
    ));
}

#[test]
fn test_hardware_tables_hold_slots_until_destroyed() {
    let device = Accelerator::new(AcceleratorConfig {
        table_slots: 1,
        queue_depth: 1,
    });
    let table = HuffmanTable::create_on(
        TableKind::Combined,
        TableRepresentation::Deflate,
        ExecutionPath::Hardware,
        &device,
    )
    .unwrap();
    assert!(table.slot_id().is_some());
    assert_eq!(device.resident_tables(), 1);

    let err = HuffmanTable::create_on(
        TableKind::Compression,
        TableRepresentation::Deflate,
        ExecutionPath::Hardware,
        &device,
    )
    .unwrap_err();
    assert!(matches!(err, JobError::Allocation { .. }));

    table.destroy().unwrap();
    assert_eq!(device.resident_tables(), 0);
}

#[test]
fn test_combined_table_can_encode_and_decode() {
    let mut combined = HuffmanTable::create(
        TableKind::Combined,
        TableRepresentation::Deflate,
        ExecutionPath::Software,
    )
    .unwrap();
    combined.init_with_histogram(sample_histogram()).unwrap();
    assert!(combined.deflate_codes().is_ok());
    assert!(combined.deflate_decoders().is_ok());
}
