use crate::aggregate::{AggregatedResult, Aggregator, SegmentAggregate};
use crate::compress::{decompress_all, validate_full, Codec, CompressingWriter};
use crate::config::{Settings, WriteStrategy};
use crate::document::aggregate_compressed;
use crate::progress::maybe_count_progress;
use crate::store::StoreClient;
use crate::strategy::write_rows;
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::BufWriter;
use std::sync::Arc;

/// Generate -> compress -> upload, and download -> decompress -> aggregate.
///
/// Both paths are linear and fail fast: the first error aborts the run and
/// any spool file or stream opened on the way is released before it returns.
#[derive(Clone)]
pub struct RfmPipeline {
    settings: Settings,
    store: Arc<StoreClient>,
}

/// Outcome of `RfmPipeline::upload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub bucket: String,
    pub key: String,
    pub rows: u64,
    pub compressed_bytes: u64,
    pub parts: u64,
    pub codec: Codec,
    pub strategy: WriteStrategy,
}

impl RfmPipeline {
    /// Validate `settings` and open a store client for its backend.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = StoreClient::new(settings.store.clone()).context("open object store client")?;
        Self::with_store(settings, Arc::new(store))
    }

    /// Use an existing client, e.g. to share one in-memory store between runs.
    pub fn with_store(settings: Settings, store: Arc<StoreClient>) -> Result<Self> {
        init_tracing_once();
        settings.validate()?;
        Ok(Self { settings, store })
    }

    /// Write header + rows through the compressing writer into a spool file,
    /// then stream the spool to `(bucket, object_key)` as a multipart upload.
    pub fn upload(&self) -> Result<UploadReport> {
        let s = &self.settings;
        let key = s.object_key();
        tracing::info!(bucket = %s.bucket, key = %key, rows = s.rows, strategy = ?s.strategy, codec = %s.codec, "generating document");

        // Deleted on drop, so an early return below never leaks it.
        let mut spool = tempfile::Builder::new()
            .prefix("rfm_customer_segmentation_")
            .suffix(&format!(".tmp{}", s.codec.extension()))
            .tempfile()
            .context("create spool file")?;

        let pb = maybe_count_progress(s.progress, s.rows, "Generating rows");
        let rows = {
            let sink = BufWriter::with_capacity(s.write_buffer_bytes, spool.as_file_mut());
            let mut writer = CompressingWriter::new(s.codec, sink).context("open compressor")?;
            let rows = write_rows(&mut writer, s, pb.as_ref())?;
            writer.finish().context("finish compressed stream")?;
            rows
        };
        if let Some(pb) = pb {
            pb.finish_with_message("Rows generated");
        }

        let compressed_bytes = spool.as_file().metadata().context("stat spool file")?.len();
        tracing::info!(bucket = %s.bucket, key = %key, compressed_bytes, part_bytes = s.upload.part_bytes, "uploading");
        let parts = self
            .store
            .put_file(&s.bucket, &key, spool.path(), &s.upload)
            .with_context(|| format!("upload {}/{}", s.bucket, key))?;
        spool.close().context("remove spool file")?;

        tracing::info!(bucket = %s.bucket, key = %key, rows, parts, "upload done");
        Ok(UploadReport {
            bucket: s.bucket.clone(),
            key,
            rows,
            compressed_bytes,
            parts,
            codec: s.codec,
            strategy: s.strategy,
        })
    }

    /// Download the object and build the segment -> customer -> value map.
    pub fn download(&self) -> Result<AggregatedResult> {
        Ok(self.download_aggregate::<SegmentAggregate>()?.finalize())
    }

    /// Download the object and feed every data row into a fresh `A`.
    /// A single bad row fails the whole read; no partial aggregate is returned.
    pub fn download_aggregate<A: Aggregator>(&self) -> Result<A> {
        let s = &self.settings;
        let key = s.object_key();
        let body = self.fetch_raw()?;
        tracing::info!(bucket = %s.bucket, key = %key, compressed_bytes = body.len(), "decoding document");

        let (agg, rows) = aggregate_compressed::<A, _>(s.codec, body.as_slice(), s.read_buffer_bytes)
            .with_context(|| format!("decode {}/{}", s.bucket, key))?;
        tracing::info!(bucket = %s.bucket, key = %key, rows, "aggregation done");
        Ok(agg)
    }

    /// Decompressed bytes of the stored object, exactly as they were written.
    pub fn fetch_decompressed(&self) -> Result<Vec<u8>> {
        let body = self.fetch_raw()?;
        decompress_all(self.settings.codec, body.as_slice())
    }

    /// Decode the stored object to EOF without parsing rows.
    /// Returns the decompressed size.
    pub fn verify_object(&self) -> Result<u64> {
        let body = self.fetch_raw()?;
        let n = validate_full(self.settings.codec, body.as_slice())
            .with_context(|| format!("verify {}/{}", self.settings.bucket, self.settings.object_key()))?;
        tracing::debug!(decompressed_bytes = n, "object verified");
        Ok(n)
    }

    fn fetch_raw(&self) -> Result<Vec<u8>> {
        let s = &self.settings;
        let key = s.object_key();
        tracing::debug!(bucket = %s.bucket, key = %key, "downloading");
        let body = self
            .store
            .get(&s.bucket, &key)
            .with_context(|| format!("download {}/{}", s.bucket, key))?;
        Ok(body)
    }
}
