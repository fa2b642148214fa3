mod config;
mod error;
mod record;
mod generator;
mod row_codec;
mod compress;
mod store;

mod aggregate;
mod document;
mod strategy;
mod progress;
mod util;
mod pipeline;

pub use crate::config::{default_workers, Settings, WriteStrategy};
pub use crate::error::{ConfigError, RowError, StoreError};
pub use crate::record::{compose_segment, is_valid_segment, split_segment, Record, SEGMENT_MAX, SEGMENT_MIN};
pub use crate::generator::{CustomerIdBounds, RowGenerator, MONETARY_MAX, MONETARY_MIN};
pub use crate::pipeline::{RfmPipeline, UploadReport};

// Row format: encoder, decoder and the fixed header line.
pub use crate::row_codec::{decode_row, encode_row, encode_row_into, write_header, write_row, HEADER, LINE_SEPARATOR};

// Document-level decoding (header skip + aggregation).
pub use crate::document::{aggregate_compressed, aggregate_text, DocumentDecoder};

// Aggregation state.
pub use crate::aggregate::{AggregatedResult, Aggregator, SegmentAggregate, SegmentStats, SegmentTotals};

// Compression codecs and the streaming writer/reader helpers.
pub use crate::compress::{compress_bytes, decompress_all, decompressing_reader, for_each_line, validate_full, Codec, CompressingWriter};

// Object store facade.
pub use crate::store::{PartUpload, StoreBackend, StoreClient};

// Lower-level write path for callers that bring their own sink.
pub use crate::strategy::write_rows;

// Expose progress and tracing helpers to the binary.
pub use crate::progress::make_count_progress;
pub use crate::util::init_tracing_once;
