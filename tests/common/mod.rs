#![allow(dead_code)]

use rfm_roundtrip::{RfmPipeline, Settings, StoreBackend, StoreClient};
use std::io::{self, Write};
use std::sync::Arc;

/// The three-row document used across the read-path tests.
pub const SAMPLE_DOCUMENT: &str =
    "'segment';'customer_id';'basePaymentValue'\n'111';'1000';'5.00'\n'222';'1000';'7.25'\n";

/// Small, quiet settings against the in-memory store.
pub fn small_settings(rows: u64) -> Settings {
    Settings::default()
        .with_bucket("test-bucket")
        .with_file_name("segments")
        .with_rows(rows)
        .with_store(StoreBackend::Memory)
        .with_progress(false)
}

/// Pipeline over a fresh in-memory store; returns the shared client too so
/// tests can seed or inspect objects directly.
pub fn memory_pipeline(settings: Settings) -> (RfmPipeline, Arc<StoreClient>) {
    let store = Arc::new(StoreClient::in_memory().unwrap());
    let pipeline = RfmPipeline::with_store(settings, store.clone()).unwrap();
    (pipeline, store)
}

/// Split a decompressed document into lines (terminators removed).
pub fn text_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

/// A sink that accepts `budget` bytes and then fails every write.
pub struct FailAfter {
    pub budget: usize,
}

impl Write for FailAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.budget {
            return Err(io::Error::new(io::ErrorKind::Other, "sink is full"));
        }
        self.budget -= buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
