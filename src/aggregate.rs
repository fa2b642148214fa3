//! Reducers over decoded records.
//! Implement `Aggregator` for your aggregation state and pass it to
//! `RfmPipeline::download_aggregate`.

use crate::record::Record;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// segment -> (customer id -> monetary value)
pub type AggregatedResult = BTreeMap<u16, BTreeMap<i64, Decimal>>;

pub trait Aggregator: Default {
    fn ingest(&mut self, record: Record);
    fn merge(&mut self, other: Self);
}

/// Two-level map of the last value seen for each `(segment, customer)` pair.
///
/// A repeated pair overwrites the earlier value (last write wins), so the
/// result depends on ingestion order only for duplicate pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentAggregate {
    by_segment: AggregatedResult,
}

impl SegmentAggregate {
    pub fn get(&self, segment: u16, customer_id: i64) -> Option<Decimal> {
        self.by_segment.get(&segment)?.get(&customer_id).copied()
    }

    pub fn segment_count(&self) -> usize {
        self.by_segment.len()
    }

    /// Number of distinct `(segment, customer)` pairs.
    pub fn customer_count(&self) -> usize {
        self.by_segment.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_segment.is_empty()
    }

    pub fn finalize(self) -> AggregatedResult {
        self.by_segment
    }
}

impl Aggregator for SegmentAggregate {
    fn ingest(&mut self, record: Record) {
        self.by_segment
            .entry(record.segment())
            .or_default()
            .insert(record.customer_id(), record.monetary_value());
    }

    /// Entries from `other` win on conflict, as if ingested after `self`.
    fn merge(&mut self, other: Self) {
        for (segment, customers) in other.by_segment {
            self.by_segment.entry(segment).or_default().extend(customers);
        }
    }
}

/// Row count and monetary sum for one segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub rows: u64,
    pub total: Decimal,
}

/// Per-segment totals over every ingested row (duplicates included).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentTotals {
    by_segment: BTreeMap<u16, SegmentStats>,
}

impl SegmentTotals {
    pub fn get(&self, segment: u16) -> Option<SegmentStats> {
        self.by_segment.get(&segment).copied()
    }

    pub fn rows(&self) -> u64 {
        self.by_segment.values().map(|s| s.rows).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, SegmentStats)> + '_ {
        self.by_segment.iter().map(|(k, v)| (*k, *v))
    }
}

impl Aggregator for SegmentTotals {
    fn ingest(&mut self, record: Record) {
        let stats = self.by_segment.entry(record.segment()).or_default();
        stats.rows += 1;
        stats.total += record.monetary_value();
    }

    fn merge(&mut self, other: Self) {
        for (segment, part) in other.by_segment {
            let stats = self.by_segment.entry(segment).or_default();
            stats.rows += part.rows;
            stats.total += part.total;
        }
    }
}

/// Feed two aggregators from one pass.
impl<A: Aggregator, B: Aggregator> Aggregator for (A, B) {
    fn ingest(&mut self, record: Record) {
        self.0.ingest(record.clone());
        self.1.ingest(record);
    }

    fn merge(&mut self, other: Self) {
        self.0.merge(other.0);
        self.1.merge(other.1);
    }
}
