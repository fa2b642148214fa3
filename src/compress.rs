use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;
use zstd::stream::read::Decoder as ZstdDecoder;
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::error::ConfigError;

/// Compression applied to the uploaded document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Gzip,
    Zstd,
}

impl Codec {
    /// Suffix appended to the base file name to form the object key.
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Gzip => ".gz",
            Codec::Zstd => ".zst",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        })
    }
}

impl FromStr for Codec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Codec::Gzip),
            "zstd" | "zst" => Ok(Codec::Zstd),
            other => Err(ConfigError::Unknown { what: "codec", value: other.to_string() }),
        }
    }
}

// ----------------------------- Writing ------------------------------------

/// Wraps a sink and compresses everything written to it.
///
/// `finish` writes the compression trailer, flushes, and returns the sink.
/// Dropping an unfinished writer releases the sink without a valid trailer,
/// which is what the failure path wants: the partial output is discarded.
pub enum CompressingWriter<W: Write> {
    Gzip(GzEncoder<W>),
    Zstd(ZstdEncoder<'static, W>),
}

impl<W: Write> CompressingWriter<W> {
    pub fn new(codec: Codec, sink: W) -> io::Result<Self> {
        Ok(match codec {
            Codec::Gzip => CompressingWriter::Gzip(GzEncoder::new(sink, Compression::default())),
            Codec::Zstd => CompressingWriter::Zstd(ZstdEncoder::new(sink, 3)?),
        })
    }

    pub fn codec(&self) -> Codec {
        match self {
            CompressingWriter::Gzip(_) => Codec::Gzip,
            CompressingWriter::Zstd(_) => Codec::Zstd,
        }
    }

    pub fn finish(self) -> io::Result<W> {
        let mut sink = match self {
            CompressingWriter::Gzip(enc) => enc.finish()?,
            CompressingWriter::Zstd(enc) => enc.finish()?,
        };
        sink.flush()?;
        Ok(sink)
    }
}

impl<W: Write> Write for CompressingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressingWriter::Gzip(enc) => enc.write(buf),
            CompressingWriter::Zstd(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressingWriter::Gzip(enc) => enc.flush(),
            CompressingWriter::Zstd(enc) => enc.flush(),
        }
    }
}

/// Compress a whole buffer in one go.
pub fn compress_bytes(codec: Codec, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut w = CompressingWriter::new(codec, Vec::with_capacity(data.len() / 2))?;
    w.write_all(data)?;
    w.finish()
}

// ----------------------------- Reading ------------------------------------

/// Decompressing view over `input`.
///
/// zstd frames are opened with `window_log_max(31)` so large windows decode
/// without "Frame requires too much memory".
pub fn decompressing_reader<'a, R: Read + 'a>(codec: Codec, input: R) -> io::Result<Box<dyn Read + 'a>> {
    let reader: Box<dyn Read + 'a> = match codec {
        Codec::Gzip => Box::new(GzDecoder::new(input)),
        Codec::Zstd => {
            let mut decoder = ZstdDecoder::new(input)?;
            decoder.window_log_max(31)?;
            Box::new(decoder)
        }
    };
    Ok(reader)
}

/// Stream decompressed lines; `on_line` sees each line without `\r?\n`.
/// The first error (decode or callback) stops the scan and is returned.
/// Returns the number of lines seen.
pub fn for_each_line<R: Read>(
    codec: Codec,
    input: R,
    read_buf_bytes: usize,
    mut on_line: impl FnMut(&str) -> Result<()>,
) -> Result<u64> {
    let decoder = decompressing_reader(codec, input).context("open decompressor")?;
    let mut reader = BufReader::with_capacity(read_buf_bytes.max(8 * 1024), decoder);

    let mut buf = Vec::with_capacity(256);
    let mut lines = 0u64;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("decompress {} stream after {} lines", codec, lines))?;
        if n == 0 {
            break;
        }
        if buf.ends_with(b"\n") {
            let _ = buf.pop();
            if buf.ends_with(b"\r") { let _ = buf.pop(); }
        }
        let line = std::str::from_utf8(&buf)
            .with_context(|| format!("line {} is not valid UTF-8", lines + 1))?;
        on_line(line)?;
        lines += 1;
    }
    Ok(lines)
}

/// Decompress the whole stream into memory.
pub fn decompress_all<R: Read>(codec: Codec, input: R) -> Result<Vec<u8>> {
    let mut decoder = decompressing_reader(codec, input)?;
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .with_context(|| format!("decompress {} stream", codec))?;
    Ok(out)
}

/// FULL check: decode the entire stream to EOF, catching trailing corruption.
/// Returns the decompressed size.
pub fn validate_full<R: Read>(codec: Codec, input: R) -> Result<u64> {
    let mut decoder = decompressing_reader(codec, input)?;
    let n = io::copy(&mut decoder, &mut io::sink())
        .with_context(|| format!("validate {} stream", codec))?;
    Ok(n)
}
