use rfm_roundtrip::{
    aggregate_compressed, compress_bytes, decompress_all, for_each_line, validate_full, Codec,
    CompressingWriter, SegmentAggregate,
};
use rust_decimal::Decimal;
use std::io::Write;

const DOC: &str = "'segment';'customer_id';'basePaymentValue'\r\n'111';'1000';'5.00'\n'222';'1000';'7.25'\n";

/// Writing through the compressing writer and reading back yields the same bytes,
/// for both codecs.
#[test]
fn writer_output_decompresses_to_input() {
    for codec in [Codec::Gzip, Codec::Zstd] {
        let mut w = CompressingWriter::new(codec, Vec::new()).unwrap();
        assert_eq!(w.codec(), codec);
        for chunk in DOC.as_bytes().chunks(7) {
            w.write_all(chunk).unwrap();
        }
        let compressed = w.finish().unwrap();
        assert!(!compressed.is_empty());

        let plain = decompress_all(codec, compressed.as_slice()).unwrap();
        assert_eq!(plain, DOC.as_bytes(), "codec {}", codec);
        assert_eq!(validate_full(codec, compressed.as_slice()).unwrap(), DOC.len() as u64);
    }
}

/// Gzip output carries the gzip magic bytes.
#[test]
fn gzip_output_has_magic() {
    let bytes = compress_bytes(Codec::Gzip, b"x").unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
}

/// Lines come back without `\n` or `\r\n`.
#[test]
fn line_reader_strips_terminators() {
    let compressed = compress_bytes(Codec::Gzip, DOC.as_bytes()).unwrap();
    let mut lines = Vec::new();
    let n = for_each_line(Codec::Gzip, compressed.as_slice(), 8 * 1024, |l| {
        lines.push(l.to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(n, 3);
    assert_eq!(lines[0], "'segment';'customer_id';'basePaymentValue'");
    assert_eq!(lines[2], "'222';'1000';'7.25'");
}

/// A callback error stops the scan immediately.
#[test]
fn line_reader_stops_on_first_error() {
    let compressed = compress_bytes(Codec::Zstd, DOC.as_bytes()).unwrap();
    let mut seen = 0;
    let res = for_each_line(Codec::Zstd, compressed.as_slice(), 8 * 1024, |_| {
        seen += 1;
        anyhow::bail!("stop here")
    });
    assert!(res.is_err());
    assert_eq!(seen, 1);
}

/// Bytes that decompress fine but are not UTF-8 are reported against their line.
#[test]
fn invalid_utf8_names_the_line() {
    let mut doc = b"'segment';'customer_id';'basePaymentValue'\n'111';'1000';'5.00'\n'222';'".to_vec();
    doc.extend_from_slice(&[0xff, 0xfe]);
    doc.extend_from_slice(b"';'7.25'\n");
    let compressed = compress_bytes(Codec::Gzip, &doc).unwrap();

    let mut seen = 0;
    let err = for_each_line(Codec::Gzip, compressed.as_slice(), 8 * 1024, |_| {
        seen += 1;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(seen, 2);
    let msg = err.to_string();
    assert!(msg.contains("line 3") && msg.contains("UTF-8"), "{}", msg);
    assert!(!msg.contains("decompress"), "{}", msg);
}

/// Plain text is not a valid compressed stream for either codec.
#[test]
fn corrupt_input_is_rejected() {
    for codec in [Codec::Gzip, Codec::Zstd] {
        assert!(validate_full(codec, DOC.as_bytes()).is_err(), "codec {}", codec);
        assert!(decompress_all(codec, DOC.as_bytes()).is_err(), "codec {}", codec);
    }
}

/// The compressed read path decodes straight into an aggregate.
#[test]
fn compressed_document_aggregates() {
    let compressed = compress_bytes(Codec::Gzip, DOC.as_bytes()).unwrap();
    let (agg, rows): (SegmentAggregate, u64) =
        aggregate_compressed(Codec::Gzip, compressed.as_slice(), 8 * 1024).unwrap();
    assert_eq!(rows, 2);
    assert_eq!(agg.get(222, 1000), Some(Decimal::new(725, 2)));
}
