use anyhow::{Context, Result};
use clap::Parser;
use rfm_roundtrip::{
    Codec, RfmPipeline, SegmentAggregate, SegmentTotals, Settings, StoreBackend, WriteStrategy,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rfm-roundtrip")]
#[command(about = "Generate synthetic RFM segmentation rows, upload them compressed, read them back")]
struct Cli {
    /// JSON settings file applied before RFM_* environment variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target bucket
    #[arg(long)]
    bucket: Option<String>,

    /// Object base name; the codec extension is appended
    #[arg(long)]
    file_name: Option<String>,

    /// Number of data rows to generate
    #[arg(long)]
    rows: Option<u64>,

    /// Write strategy: sequential or fan-out
    #[arg(long)]
    strategy: Option<String>,

    /// Producer count for the fan-out strategy
    #[arg(long)]
    workers: Option<usize>,

    /// Compression codec: gzip or zstd
    #[arg(long)]
    codec: Option<Codec>,

    /// Object store: memory, s3, s3:<region>, or a local directory
    #[arg(long)]
    store: Option<StoreBackend>,

    /// S3 region; only used with the s3 store
    #[arg(long)]
    region: Option<String>,

    /// Seed for reproducible rows
    #[arg(long)]
    seed: Option<u64>,

    /// Lowest customer id (inclusive)
    #[arg(long)]
    min_customer_id: Option<i64>,

    /// Highest customer id (exclusive)
    #[arg(long)]
    max_customer_id: Option<i64>,

    /// Write the downloaded aggregate as JSON to this path
    #[arg(long)]
    aggregate_out: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Upload only
    #[arg(long)]
    skip_download: bool,
}

impl Cli {
    fn resolve_settings(&self) -> Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default().with_progress(true),
        };
        let mut s = base.apply_env()?;

        if let Some(v) = &self.bucket { s.bucket = v.clone(); }
        if let Some(v) = &self.file_name { s.file_name = v.clone(); }
        if let Some(v) = self.rows { s.rows = v; }
        if let Some(v) = self.codec { s.codec = v; }
        if let Some(v) = &self.store { s.store = v.clone(); }
        if let Some(v) = &self.region { s = s.with_region(v.clone()); }
        if let Some(v) = self.seed { s.seed = Some(v); }
        if let Some(v) = self.min_customer_id { s.customer_ids.min = v; }
        if let Some(v) = self.max_customer_id { s.customer_ids.max = v; }

        match (&self.strategy, self.workers) {
            (Some(name), workers) => {
                let n = workers.unwrap_or_else(rfm_roundtrip::default_workers);
                s.strategy = WriteStrategy::parse(name, n)?;
            }
            (None, Some(n)) => {
                if let WriteStrategy::FanOut { .. } = s.strategy {
                    s.strategy = WriteStrategy::FanOut { workers: n };
                }
            }
            (None, None) => {}
        }
        if self.no_progress {
            s.progress = false;
        }
        s.validate()?;
        Ok(s)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;
    let pipeline = RfmPipeline::new(settings)?;

    let report = pipeline.upload()?;
    println!(
        "Uploaded {} rows to {}/{} ({} compressed bytes in {} parts, {})",
        report.rows, report.bucket, report.key, report.compressed_bytes, report.parts, report.codec
    );

    if cli.skip_download {
        return Ok(());
    }

    let (agg, totals) = pipeline.download_aggregate::<(SegmentAggregate, SegmentTotals)>()?;
    println!(
        "Read back {} rows: {} segments, {} distinct customers",
        totals.rows(),
        agg.segment_count(),
        agg.customer_count()
    );
    for (segment, stats) in totals.iter() {
        println!("  {:>3}  rows={:<8} total={}", segment, stats.rows, stats.total);
    }

    if let Some(path) = &cli.aggregate_out {
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, &agg)?;
        w.flush()?;
        println!("Aggregate written to {}", path.display());
    }
    Ok(())
}
