//! Document-level decoding: header framing plus per-line decode into an aggregator.

use crate::aggregate::Aggregator;
use crate::compress::{for_each_line, Codec};
use crate::error::RowError;
use crate::row_codec::decode_row;
use anyhow::Result;
use std::io::Read;

/// Line-at-a-time decoder for one document.
///
/// The first line is the header and is skipped without being looked at. Every
/// later line must decode, otherwise the whole document is rejected and the
/// aggregator is dropped with it.
pub struct DocumentDecoder<A: Aggregator> {
    agg: A,
    header_seen: bool,
    rows: u64,
}

impl<A: Aggregator> Default for DocumentDecoder<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: Aggregator> DocumentDecoder<A> {
    pub fn new(agg: A) -> Self {
        Self { agg, header_seen: false, rows: 0 }
    }

    pub fn push_line(&mut self, line: &str) -> Result<(), RowError> {
        if !self.header_seen {
            self.header_seen = true;
            return Ok(());
        }
        let record = decode_row(line)?;
        self.agg.ingest(record);
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<(A, u64), RowError> {
        if !self.header_seen {
            return Err(RowError::MissingHeader);
        }
        Ok((self.agg, self.rows))
    }
}

/// Decode an uncompressed document held in memory.
pub fn aggregate_text<A: Aggregator>(text: &str) -> Result<A, RowError> {
    let mut decoder = DocumentDecoder::<A>::default();
    for line in text.lines() {
        decoder.push_line(line)?;
    }
    decoder.finish().map(|(agg, _)| agg)
}

/// Decompress `input` with `codec` and decode it line by line.
/// Returns the aggregate and the number of data rows.
pub fn aggregate_compressed<A: Aggregator, R: Read>(
    codec: Codec,
    input: R,
    read_buf_bytes: usize,
) -> Result<(A, u64)> {
    let mut decoder = DocumentDecoder::<A>::default();
    for_each_line(codec, input, read_buf_bytes, |line| Ok(decoder.push_line(line)?))?;
    Ok(decoder.finish()?)
}
