//! Quoted, semicolon-delimited row format.
//!
//! Every field is wrapped in single quotes and fields are joined with `;`.
//! There is no escaping: a literal `'` or `;` inside a field cannot be
//! represented and corrupts the row.

use crate::error::RowError;
use crate::record::Record;
use rust_decimal::Decimal;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// First line of every document; skipped unparsed on read.
pub const HEADER: &str = "'segment';'customer_id';'basePaymentValue'";

pub const LINE_SEPARATOR: char = '\n';
const QUOTE: char = '\'';
const DELIMITER: char = ';';

/// `'<segment>';'<customerId>';'<monetaryValue>'\n`
pub fn encode_row(record: &Record) -> String {
    let mut s = String::with_capacity(40);
    encode_row_into(record, &mut s);
    s
}

/// Append the encoded row to `out` (used to build worker batches).
pub fn encode_row_into(record: &Record, out: &mut String) {
    use std::fmt::Write as _;
    let _ = write!(out, "{}", EncodedRow(record));
}

pub fn write_row<W: Write + ?Sized>(w: &mut W, record: &Record) -> io::Result<()> {
    write!(w, "{}", EncodedRow(record))
}

struct EncodedRow<'a>(&'a Record);

impl fmt::Display for EncodedRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        write!(
            f,
            "{q}{}{q}{d}{q}{}{q}{d}{q}{}{q}{}",
            r.segment(),
            r.customer_id(),
            r.monetary_value(),
            LINE_SEPARATOR,
            q = QUOTE,
            d = DELIMITER,
        )
    }
}

pub fn write_header<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    w.write_all(HEADER.as_bytes())?;
    w.write_all(&[LINE_SEPARATOR as u8])
}

/// Parse one data line (without its terminator) back into a `Record`.
///
/// Quote characters are removed wherever they appear, then the line is split
/// on `;` and trailing empty fields are dropped, so `'1';'2';'3';` still has
/// three fields. Fields are positional: segment, customer id, monetary value.
pub fn decode_row(line: &str) -> Result<Record, RowError> {
    let stripped: String = line.chars().filter(|&c| c != QUOTE).collect();
    let fields = split_fields(&stripped);
    if fields.len() != 3 {
        return Err(RowError::Malformed { line: line.to_string(), fields: fields.len() });
    }

    let parse_err = |field: &'static str, reason: String| RowError::Parse {
        line: line.to_string(),
        field,
        reason,
    };

    let segment = fields[0]
        .parse::<u16>()
        .map_err(|e| parse_err("segment", e.to_string()))?;
    let customer_id = fields[1]
        .parse::<i64>()
        .map_err(|e| parse_err("customer_id", e.to_string()))?;
    let monetary_value = parse_plain_decimal(fields[2]).map_err(|e| parse_err("basePaymentValue", e))?;

    Ok(Record::new(segment, customer_id, monetary_value))
}

// An empty line is one empty field; otherwise trailing empties are dropped.
fn split_fields(stripped: &str) -> Vec<&str> {
    if stripped.is_empty() {
        return vec![stripped];
    }
    let mut fields: Vec<&str> = stripped.split(DELIMITER).collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// `[+-]digits[.digits]` only. `Decimal::from_str` alone also takes `_`
/// separators, which would let `1_0.00` through as `10.00`.
fn parse_plain_decimal(field: &str) -> Result<Decimal, String> {
    let digits = field.strip_prefix(['+', '-']).unwrap_or(field);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let well_formed = match frac {
        Some(frac) => !int.is_empty() && !frac.is_empty() && all_digits(int) && all_digits(frac),
        None => !int.is_empty() && all_digits(int),
    };
    if !well_formed {
        return Err(format!("invalid decimal literal {:?}", field));
    }
    Decimal::from_str(field).map_err(|e| e.to_string())
}
