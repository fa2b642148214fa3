use crate::compress::Codec;
use crate::error::ConfigError;
use crate::generator::CustomerIdBounds;
use crate::store::{PartUpload, StoreBackend};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How rows reach the compressing writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum WriteStrategy {
    /// Generate, encode and write on the calling thread.
    #[default]
    Sequential,
    /// `workers` producers feed a single writer over a bounded channel.
    FanOut { workers: usize },
}

impl WriteStrategy {
    /// `sequential` or `fan-out`; `workers` only matters for fan-out.
    pub fn parse(name: &str, workers: usize) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sequential" | "single" => Ok(WriteStrategy::Sequential),
            "fan-out" | "fanout" | "parallel" => Ok(WriteStrategy::FanOut { workers }),
            other => Err(ConfigError::Unknown { what: "write strategy", value: other.to_string() }),
        }
    }
}

/// Run settings with defaults and builder chaining.
///
/// Resolved once at start-up (defaults, then an optional JSON file, then
/// `RFM_*` environment variables, then CLI flags) and handed to the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bucket: String,
    pub file_name: String,     // object key without the codec extension
    pub rows: u64,
    pub strategy: WriteStrategy,
    pub codec: Codec,
    pub store: StoreBackend,
    pub seed: Option<u64>,     // None draws from OS entropy
    pub customer_ids: CustomerIdBounds,
    pub progress: bool,

    // fan-out tuning
    pub batch_rows: usize,       // rows per channel message
    pub channel_capacity: usize, // batches in flight

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
    pub upload: PartUpload, // multipart shape for the spool upload
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket: "rfm-segmentation".to_string(),
            file_name: "customer_segmentation".to_string(),
            rows: 50_000,
            strategy: WriteStrategy::Sequential,
            codec: Codec::Gzip,
            store: StoreBackend::Memory,
            seed: None,
            customer_ids: CustomerIdBounds::default(),
            progress: false,

            batch_rows: 1024,
            channel_capacity: 16,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
            upload: PartUpload::default(),
        }
    }
}

impl Settings {
    /// Full object key: base file name plus the codec extension.
    pub fn object_key(&self) -> String {
        format!("{}{}", self.file_name, self.codec.extension())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let settings: Settings =
            serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
        Ok(settings)
    }

    /// Overlay `RFM_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay `RFM_*` variables resolved through `lookup`.
    ///
    /// - RFM_BUCKET, RFM_FILE_NAME, RFM_ROWS, RFM_SEED
    /// - RFM_STRATEGY (`sequential` / `fan-out`) with RFM_WORKERS
    /// - RFM_CODEC (`gzip` / `zstd`)
    /// - RFM_STORE (`memory`, `s3`, `s3:<region>`, or a directory), RFM_REGION
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("RFM_BUCKET") {
            self.bucket = v;
        }
        if let Some(v) = get("RFM_FILE_NAME") {
            self.file_name = v;
        }
        if let Some(v) = get("RFM_ROWS") {
            self.rows = v.parse().with_context(|| format!("RFM_ROWS={}", v))?;
        }
        if let Some(v) = get("RFM_SEED") {
            self.seed = Some(v.parse().with_context(|| format!("RFM_SEED={}", v))?);
        }

        let workers = match get("RFM_WORKERS") {
            Some(v) => Some(v.parse::<usize>().with_context(|| format!("RFM_WORKERS={}", v))?),
            None => None,
        };
        if let Some(v) = get("RFM_STRATEGY") {
            let current = match self.strategy {
                WriteStrategy::FanOut { workers } => workers,
                WriteStrategy::Sequential => default_workers(),
            };
            self.strategy = WriteStrategy::parse(&v, workers.unwrap_or(current))?;
        } else if let (Some(n), WriteStrategy::FanOut { .. }) = (workers, self.strategy) {
            self.strategy = WriteStrategy::FanOut { workers: n };
        }

        if let Some(v) = get("RFM_CODEC") {
            self.codec = v.parse()?;
        }
        if let Some(v) = get("RFM_STORE") {
            self.store = v.parse()?;
        }
        if let Some(region) = get("RFM_REGION") {
            self = self.with_region(region);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Empty("bucket"));
        }
        if self.file_name.trim().is_empty() {
            return Err(ConfigError::Empty("file name"));
        }
        if let WriteStrategy::FanOut { workers: 0 } = self.strategy {
            return Err(ConfigError::NoWorkers);
        }
        let CustomerIdBounds { min, max } = self.customer_ids;
        if min >= max {
            return Err(ConfigError::EmptyIdRange { min, max });
        }
        for (what, n) in [
            ("batch_rows", self.batch_rows),
            ("channel_capacity", self.channel_capacity),
            ("upload.part_bytes", self.upload.part_bytes),
            ("upload.concurrency", self.upload.concurrency),
        ] {
            if n == 0 {
                return Err(ConfigError::Zero(what));
            }
        }
        Ok(())
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }
    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }
    /// Region for the S3 backend; other backends ignore it.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        if let StoreBackend::S3 { region: r } = &mut self.store {
            *r = Some(region.into());
        }
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn with_customer_ids(mut self, min: i64, max: i64) -> Self {
        self.customer_ids = CustomerIdBounds { min, max };
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }
    pub fn with_channel_capacity(mut self, batches: usize) -> Self {
        self.channel_capacity = batches.max(1);
        self
    }
    pub fn with_part_upload(mut self, part_bytes: usize, concurrency: usize) -> Self {
        self.upload = PartUpload { part_bytes: part_bytes.max(1), concurrency: concurrency.max(1) };
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}

/// Fan-out worker count when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
