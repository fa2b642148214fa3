#[path = "common/mod.rs"]
mod common;

use common::*;
use rfm_roundtrip::{
    aggregate_text, compress_bytes, decode_row, write_rows, Codec, RfmPipeline, RowError,
    SegmentAggregate, Settings, StoreBackend, StoreClient, StoreError, WriteStrategy, HEADER,
};
use std::sync::Arc;

/// Upload then read the same key: the decompressed object is byte-identical to
/// the document the write path produces locally for the same seed.
#[test]
fn upload_then_fetch_is_byte_identical() {
    let settings = small_settings(500).with_seed(11);
    let (pipeline, _) = memory_pipeline(settings.clone());

    let report = pipeline.upload().unwrap();
    assert_eq!(report.rows, 500);
    assert_eq!(report.key, "segments.gz");
    assert!(report.compressed_bytes > 0);
    assert_eq!(report.parts, 1);

    let mut expected = Vec::new();
    write_rows(&mut expected, &settings, None).unwrap();

    let fetched = pipeline.fetch_decompressed().unwrap();
    assert_eq!(fetched, expected);
    assert_eq!(pipeline.verify_object().unwrap(), expected.len() as u64);
}

/// The stored document is a header line followed by one decodable line per row.
#[test]
fn stored_document_has_header_and_rows() {
    let (pipeline, _) = memory_pipeline(small_settings(250));
    pipeline.upload().unwrap();

    let lines = text_lines(&pipeline.fetch_decompressed().unwrap());
    assert_eq!(lines.len(), 251);
    assert_eq!(lines[0], HEADER);
    for line in &lines[1..] {
        decode_row(line).unwrap();
    }
}

/// The downloaded aggregate matches decoding the same document locally.
#[test]
fn download_matches_local_decode() {
    let settings = small_settings(1_000).with_seed(3);
    let (pipeline, _) = memory_pipeline(settings.clone());
    pipeline.upload().unwrap();

    let mut doc = Vec::new();
    write_rows(&mut doc, &settings, None).unwrap();
    let local: SegmentAggregate = aggregate_text(std::str::from_utf8(&doc).unwrap()).unwrap();

    assert_eq!(pipeline.download().unwrap(), local.finalize());
}

/// Fan-out writes exactly `rows` data lines after a single header line.
#[test]
fn fan_out_writes_every_row_once() {
    let settings = small_settings(10_007)
        .with_strategy(WriteStrategy::FanOut { workers: 4 })
        .with_batch_rows(64)
        .with_channel_capacity(2);
    let (pipeline, _) = memory_pipeline(settings);

    let report = pipeline.upload().unwrap();
    assert_eq!(report.rows, 10_007);

    let lines = text_lines(&pipeline.fetch_decompressed().unwrap());
    assert_eq!(lines.len(), 10_008);
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.iter().filter(|l| l.as_str() == HEADER).count(), 1);

    let agg = pipeline.download_aggregate::<SegmentAggregate>().unwrap();
    assert!(agg.customer_count() <= 10_007);
    assert!(agg.segment_count() <= 64);
}

/// A failing sink stops the fan-out write with an error instead of hanging or
/// dropping the failure.
#[test]
fn fan_out_write_failure_propagates() {
    let settings = small_settings(50_000)
        .with_strategy(WriteStrategy::FanOut { workers: 3 })
        .with_batch_rows(16)
        .with_channel_capacity(1);
    let mut sink = FailAfter { budget: 2_000 };
    let err = write_rows(&mut sink, &settings, None).unwrap_err();
    assert!(format!("{:#}", err).contains("sink is full"), "{:#}", err);
}

/// Same for the sequential strategy.
#[test]
fn sequential_write_failure_propagates() {
    let settings = small_settings(1_000);
    let mut sink = FailAfter { budget: 500 };
    assert!(write_rows(&mut sink, &settings, None).is_err());
}

/// Zero rows uploads a header-only document that reads back as empty.
#[test]
fn zero_rows_round_trip_to_empty_aggregate() {
    let (pipeline, _) = memory_pipeline(small_settings(0));
    pipeline.upload().unwrap();
    assert!(pipeline.download().unwrap().is_empty());
}

/// Reading a key that was never written is a NotFound store error.
#[test]
fn missing_object_is_not_found() {
    let (pipeline, _) = memory_pipeline(small_settings(10));
    let err = pipeline.download().unwrap_err();
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::NotFound { bucket, key }) => {
            assert_eq!(bucket, "test-bucket");
            assert_eq!(key, "segments.gz");
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

/// A stored document with a malformed row fails the read and reports the line.
#[test]
fn malformed_object_fails_the_read() {
    let (pipeline, store) = memory_pipeline(small_settings(10));
    let doc = format!("{}\n'111';'1';'1.00'\n'bad row'\n", HEADER);
    store
        .put("test-bucket", "segments.gz", compress_bytes(Codec::Gzip, doc.as_bytes()).unwrap())
        .unwrap();

    let err = pipeline.download().unwrap_err();
    match err.downcast_ref::<RowError>() {
        Some(RowError::Malformed { line, .. }) => assert_eq!(line, "'bad row'"),
        other => panic!("expected Malformed, got {:?}", other),
    }
}

/// The codec picks the key extension and the read path follows it.
#[test]
fn zstd_codec_round_trips() {
    let (pipeline, store) = memory_pipeline(small_settings(100).with_codec(Codec::Zstd));
    let report = pipeline.upload().unwrap();
    assert_eq!(report.key, "segments.zst");
    assert!(store.get("test-bucket", "segments.zst").is_ok());
    assert!(store.get("test-bucket", "segments.gz").is_err());

    let lines = text_lines(&pipeline.fetch_decompressed().unwrap());
    assert_eq!(lines.len(), 101);
}

/// Two pipelines sharing one client see each other's objects.
#[test]
fn shared_store_between_pipelines() {
    let store = Arc::new(StoreClient::in_memory().unwrap());
    let writer = RfmPipeline::with_store(small_settings(20).with_seed(5), store.clone()).unwrap();
    let reader = RfmPipeline::with_store(small_settings(0), store).unwrap();

    writer.upload().unwrap();
    assert_eq!(reader.fetch_decompressed().unwrap(), writer.fetch_decompressed().unwrap());
}

/// The local-directory backend stores objects at `<root>/<bucket>/<key>`.
#[test]
fn local_backend_writes_under_bucket_dir() {
    let dir = tempfile::tempdir().unwrap();
    let settings = small_settings(30).with_store(StoreBackend::Local { root: dir.path().to_path_buf() });
    let pipeline = RfmPipeline::new(settings).unwrap();
    pipeline.upload().unwrap();

    let stored = dir.path().join("test-bucket").join("segments.gz");
    assert!(stored.exists());

    let agg = pipeline.download_aggregate::<SegmentAggregate>().unwrap();
    assert!(agg.customer_count() >= 1);
}

/// Invalid settings never reach the store.
#[test]
fn invalid_settings_are_rejected() {
    let bad = [
        small_settings(1).with_strategy(WriteStrategy::FanOut { workers: 0 }),
        small_settings(1).with_customer_ids(10, 10),
        small_settings(1).with_bucket(""),
        Settings::default().with_file_name(" "),
    ];
    for s in bad {
        assert!(RfmPipeline::new(s).is_err());
    }
}

/// A spool larger than one part goes up in several parts and reads back intact,
/// on both the in-memory and the local-directory backend.
#[test]
fn multipart_upload_spans_several_parts() {
    let dir = tempfile::tempdir().unwrap();
    let part_bytes = 16 * 1024;
    for backend in [StoreBackend::Memory, StoreBackend::Local { root: dir.path().to_path_buf() }] {
        let settings = small_settings(20_000)
            .with_seed(5)
            .with_store(backend.clone())
            .with_part_upload(part_bytes, 2);
        let pipeline = RfmPipeline::new(settings.clone()).unwrap();

        let report = pipeline.upload().unwrap();
        assert!(report.compressed_bytes > 2 * part_bytes as u64, "{:?}", report);
        assert!(report.parts > 1, "{:?}", report);
        assert_eq!(report.parts, report.compressed_bytes.div_ceil(part_bytes as u64));

        let mut expected = Vec::new();
        write_rows(&mut expected, &settings, None).unwrap();
        assert_eq!(pipeline.fetch_decompressed().unwrap(), expected, "{:?}", backend);
    }
}

/// A batch size far beyond the row count is fine: buffers are sized by the rows
/// a producer actually holds.
#[test]
fn oversized_batches_do_not_overflow() {
    let settings = small_settings(3_000)
        .with_strategy(WriteStrategy::FanOut { workers: 3 })
        .with_batch_rows(usize::MAX);
    let (pipeline, _) = memory_pipeline(settings);

    let report = pipeline.upload().unwrap();
    assert_eq!(report.rows, 3_000);
    assert_eq!(text_lines(&pipeline.fetch_decompressed().unwrap()).len(), 3_001);
}
