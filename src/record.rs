use rust_decimal::Decimal;

/// Smallest and largest segment codes (`111` and `444`).
pub const SEGMENT_MIN: u16 = 111;
pub const SEGMENT_MAX: u16 = 444;

/// One synthetic customer-segmentation row.
///
/// Equality on `monetary_value` is numeric, so `5.0` and `5.00` compare equal
/// even though the decoded scale is kept as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    segment: u16,
    customer_id: i64,
    monetary_value: Decimal,
}

impl Record {
    pub fn new(segment: u16, customer_id: i64, monetary_value: Decimal) -> Self {
        Self { segment, customer_id, monetary_value }
    }

    #[inline]
    pub fn segment(&self) -> u16 {
        self.segment
    }

    #[inline]
    pub fn customer_id(&self) -> i64 {
        self.customer_id
    }

    #[inline]
    pub fn monetary_value(&self) -> Decimal {
        self.monetary_value
    }

    /// Recency, frequency and monetary sub-scores of the segment code.
    pub fn segment_digits(&self) -> [u16; 3] {
        split_segment(self.segment)
    }
}

/// Compose a segment code from its three sub-scores.
#[inline]
pub fn compose_segment(recency: u16, frequency: u16, monetary: u16) -> u16 {
    recency * 100 + frequency * 10 + monetary
}

#[inline]
pub fn split_segment(segment: u16) -> [u16; 3] {
    [segment / 100, (segment / 10) % 10, segment % 10]
}

/// True when `segment` is a three-digit code with every digit in `[1,4]`.
pub fn is_valid_segment(segment: u16) -> bool {
    (SEGMENT_MIN..=SEGMENT_MAX).contains(&segment)
        && split_segment(segment).iter().all(|d| (1..=4).contains(d))
}
