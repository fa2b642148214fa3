//! Blocking facade over `object_store`.
//!
//! The pipeline is synchronous, so the client owns a current-thread tokio
//! runtime and blocks on every call until the store has answered. There are no
//! retries: store errors are mapped onto `StoreError` and returned as-is.
//!
//! Files go up as multipart uploads, read part by part from disk, so a spool
//! of any size never has to fit in memory.

use crate::error::{ConfigError, StoreError};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, WriteMultipart};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

/// Where objects live.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; contents vanish with the client.
    #[default]
    Memory,
    /// One directory per bucket under `root`.
    Local { root: PathBuf },
    /// Amazon S3; credentials and endpoint come from the `AWS_*` environment.
    S3 { region: Option<String> },
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    /// `memory`, `s3`, `s3:<region>`, `file://<dir>` or a bare directory path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::Empty("store"));
        }
        if s.eq_ignore_ascii_case("memory") {
            return Ok(StoreBackend::Memory);
        }
        if s.eq_ignore_ascii_case("s3") {
            return Ok(StoreBackend::S3 { region: None });
        }
        if let Some(region) = s.strip_prefix("s3:") {
            return Ok(StoreBackend::S3 { region: Some(region.to_string()) });
        }
        let root = s.strip_prefix("file://").unwrap_or(s);
        Ok(StoreBackend::Local { root: PathBuf::from(root) })
    }
}

/// Multipart upload shape: part size and parts in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartUpload {
    /// S3 rejects non-final parts under 5 MiB.
    pub part_bytes: usize,
    pub concurrency: usize,
}

impl Default for PartUpload {
    fn default() -> Self {
        Self { part_bytes: 5 * 1024 * 1024, concurrency: 3 }
    }
}

impl PartUpload {
    /// Parts needed for `bytes` of payload; an empty payload still sends one.
    pub fn parts_for(&self, bytes: u64) -> u64 {
        bytes.div_ceil(self.part_bytes.max(1) as u64).max(1)
    }
}

pub struct StoreClient {
    backend: StoreBackend,
    buckets: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
    rt: Runtime,
}

impl StoreClient {
    pub fn new(backend: StoreBackend) -> Result<Self, StoreError> {
        let rt = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { backend, buckets: Mutex::new(HashMap::new()), rt })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(StoreBackend::Memory)
    }

    /// Store `bytes` under `(bucket, key)`; returns once the store has accepted them.
    pub fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let store = self.bucket(bucket, key)?;
        let path = ObjectPath::from(key);
        let len = bytes.len();
        self.rt
            .block_on(store.put(&path, PutPayload::from(bytes)))
            .map_err(|e| map_store_error(bucket, key, e))?;
        tracing::debug!(bucket, key, bytes = len, "object stored");
        Ok(())
    }

    /// Stream a local file up as a multipart upload.
    ///
    /// At most `parts.concurrency` parts are in flight; the file is read one
    /// part at a time. On any failure the upload is aborted so no partial
    /// object becomes visible. Returns the number of parts sent.
    pub fn put_file(&self, bucket: &str, key: &str, file: &Path, parts: &PartUpload) -> Result<u64, StoreError> {
        let store = self.bucket(bucket, key)?;
        let path = ObjectPath::from(key);
        let mut spool = File::open(file)?;
        let part_bytes = parts.part_bytes.max(1);
        let concurrency = parts.concurrency.max(1);

        let total = self
            .rt
            .block_on(stream_file(store.as_ref(), &path, &mut spool, part_bytes, concurrency))
            .map_err(|e| match e {
                PartError::Read(e) => StoreError::Io(e),
                PartError::Store(e) => map_store_error(bucket, key, e),
            })?;

        let sent = parts.parts_for(total);
        tracing::debug!(bucket, key, bytes = total, parts = sent, "object stored (multipart)");
        Ok(sent)
    }

    /// Fetch the full object body.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let store = self.bucket(bucket, key)?;
        let path = ObjectPath::from(key);
        let bytes = self
            .rt
            .block_on(fetch(store.as_ref(), &path))
            .map_err(|e| map_store_error(bucket, key, e))?;
        tracing::debug!(bucket, key, bytes = bytes.len(), "object fetched");
        Ok(bytes)
    }

    fn bucket(&self, bucket: &str, key: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let mut buckets = self.buckets.lock();
        if let Some(store) = buckets.get(bucket) {
            return Ok(store.clone());
        }
        let store = self.open_bucket(bucket).map_err(|e| StoreError::Backend {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        buckets.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn open_bucket(&self, bucket: &str) -> anyhow::Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match &self.backend {
            StoreBackend::Memory => Arc::new(InMemory::new()),
            StoreBackend::Local { root } => {
                let dir = root.join(bucket);
                fs::create_dir_all(&dir)?;
                Arc::new(LocalFileSystem::new_with_prefix(&dir)?)
            }
            StoreBackend::S3 { region } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(store)
    }
}

async fn fetch(store: &dyn ObjectStore, path: &ObjectPath) -> object_store::Result<Vec<u8>> {
    let result = store.get(path).await?;
    Ok(result.bytes().await?.to_vec())
}

enum PartError {
    Read(std::io::Error),
    Store(object_store::Error),
}

async fn stream_file(
    store: &dyn ObjectStore,
    path: &ObjectPath,
    spool: &mut File,
    part_bytes: usize,
    concurrency: usize,
) -> Result<u64, PartError> {
    let upload = store.put_multipart(path).await.map_err(PartError::Store)?;
    let mut writer = WriteMultipart::new_with_chunk_size(upload, part_bytes);
    let mut buf = vec![0u8; part_bytes];
    let mut total = 0u64;
    let streamed = loop {
        let n = match read_part(spool, &mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(PartError::Read(e)),
        };
        if let Err(e) = writer.wait_for_capacity(concurrency).await {
            break Err(PartError::Store(e));
        }
        writer.write(&buf[..n]);
        total += n as u64;
    };
    match streamed {
        Ok(()) => {
            writer.finish().await.map_err(PartError::Store)?;
            Ok(total)
        }
        Err(e) => {
            if let Err(abort) = writer.abort().await {
                tracing::warn!(path = %path, error = %abort, "multipart abort failed");
            }
            Err(e)
        }
    }
}

// Fill `buf` unless EOF comes first; returns bytes read.
fn read_part(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn map_store_error(bucket: &str, key: &str, e: object_store::Error) -> StoreError {
    let (bucket, key) = (bucket.to_string(), key.to_string());
    match e {
        object_store::Error::NotFound { .. } => StoreError::NotFound { bucket, key },
        e @ (object_store::Error::PermissionDenied { .. }
        | object_store::Error::Unauthenticated { .. }) => StoreError::Access {
            bucket,
            key,
            reason: e.to_string(),
        },
        other => StoreError::Backend { bucket, key, reason: other.to_string() },
    }
}
