//! Write strategies: stream header + generated rows into one writer.
//!
//! The fan-out variant keeps a single writer by construction: producers on a
//! dedicated rayon pool encode batches and hand them over a bounded channel to
//! the consumer running on the calling thread, which alone touches the writer.

use crate::config::{Settings, WriteStrategy};
use crate::generator::{CustomerIdBounds, RowGenerator};
use crate::row_codec::{encode_row_into, write_header, write_row};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};

/// What a producer knows about its share of the work.
#[derive(Clone, Copy, Debug)]
struct ProducerPlan {
    worker: usize,
    rows: u64,
    seed: Option<u64>,
    bounds: CustomerIdBounds,
    batch_rows: usize,
}

/// Encoded rows travelling from a producer to the writer.
struct Batch {
    rows: u64,
    text: String,
}

/// Write the header and `settings.rows` rows into `w` using the configured strategy.
/// Returns the number of data rows written.
pub fn write_rows<W: Write>(w: &mut W, settings: &Settings, pb: Option<&ProgressBar>) -> Result<u64> {
    write_header(w).context("write header")?;
    match settings.strategy {
        WriteStrategy::Sequential => write_sequential(w, settings, pb),
        WriteStrategy::FanOut { workers } => write_fan_out(w, settings, workers, pb),
    }
}

fn write_sequential<W: Write>(w: &mut W, settings: &Settings, pb: Option<&ProgressBar>) -> Result<u64> {
    let mut generator = RowGenerator::for_worker(settings.seed, 0, settings.customer_ids);
    for i in 0..settings.rows {
        let record = generator.generate();
        write_row(w, &record).with_context(|| format!("write row {}", i))?;
        if let Some(pb) = pb {
            pb.inc(1);
        }
    }
    Ok(settings.rows)
}

fn write_fan_out<W: Write>(
    w: &mut W,
    settings: &Settings,
    workers: usize,
    pb: Option<&ProgressBar>,
) -> Result<u64> {
    let workers = workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("rfm-producer-{}", i))
        .build()
        .context("build producer pool")?;

    let (tx, rx) = sync_channel::<Batch>(settings.channel_capacity.max(1));
    let stop = AtomicBool::new(false);
    let shares = split_rows(settings.rows, workers);
    tracing::debug!(workers, rows = settings.rows, "fan-out write started");

    let mut written = 0u64;
    let outcome: Result<()> = pool.in_place_scope(|s| {
        for (worker, rows) in shares.into_iter().enumerate() {
            let plan = ProducerPlan {
                worker,
                rows,
                seed: settings.seed,
                bounds: settings.customer_ids,
                batch_rows: settings.batch_rows.max(1),
            };
            let tx = tx.clone();
            let stop = &stop;
            s.spawn(move |_| produce(plan, tx, stop));
        }
        // Only producers hold senders now; the loop below ends once they are all done.
        drop(tx);

        let mut outcome = Ok(());
        for batch in rx.iter() {
            if let Err(e) = w.write_all(batch.text.as_bytes()) {
                stop.store(true, Ordering::Relaxed);
                outcome = Err(anyhow::Error::new(e).context(format!("write batch after {} rows", written)));
                break;
            }
            written += batch.rows;
            if let Some(pb) = pb {
                pb.inc(batch.rows);
            }
        }
        // Unblocks producers stuck on a full channel after a failure.
        drop(rx);
        outcome
    });
    outcome?;

    tracing::debug!(rows = written, "fan-out write finished");
    Ok(written)
}

const ROW_BYTES_HINT: usize = 40;
const MAX_BATCH_PREALLOC: usize = 4 * 1024 * 1024;

fn produce(plan: ProducerPlan, tx: SyncSender<Batch>, stop: &AtomicBool) {
    let mut generator = RowGenerator::for_worker(plan.seed, plan.worker, plan.bounds);
    let mut left = plan.rows;
    while left > 0 {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let n = left.min(plan.batch_rows as u64);
        let mut text = String::with_capacity((n as usize).saturating_mul(ROW_BYTES_HINT).min(MAX_BATCH_PREALLOC));
        for _ in 0..n {
            encode_row_into(&generator.generate(), &mut text);
        }
        if tx.send(Batch { rows: n, text }).is_err() {
            // Consumer is gone: it failed and already holds the error.
            return;
        }
        left -= n;
    }
}

/// Split `rows` into `workers` near-equal shares.
pub(crate) fn split_rows(rows: u64, workers: usize) -> Vec<u64> {
    let workers = workers.max(1) as u64;
    let base = rows / workers;
    let extra = rows % workers;
    (0..workers).map(|i| base + u64::from(i < extra)).collect()
}
