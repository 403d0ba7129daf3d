//! Container magics, format and codec identifiers.

use super::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Magic of the legacy bsdiff 4.x format.
pub const LEGACY_MAGIC: &[u8; 8] = b"BSDIFF40";

/// Magic of the BSDF2 format, followed by three codec bytes.
pub const BSDF2_MAGIC: &[u8; 5] = b"BSDF2";

/// Magic of the interleaved Endsley format.
pub const ENDSLEY_MAGIC: &[u8; 16] = b"ENDSLEY/BSDIFF43";

/// Header size of the legacy and BSDF2 formats.
pub const BSDIFF_HEADER_SIZE: usize = 32;

/// Header size of the Endsley format.
pub const ENDSLEY_HEADER_SIZE: usize = 24;

/// Container format of a patch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BsdiffFormat {
    /// `BSDIFF40`: three bzip2 streams.
    Legacy,

    /// `BSDF2`: three streams, each with its own codec.
    Bsdf2,

    /// `ENDSLEY/BSDIFF43`: one interleaved stream.
    Endsley,
}

impl BsdiffFormat {
    /// Checks whether streams of this format may use the codec.
    pub fn supports(self, kind: CompressorType) -> bool {
        use CompressorType::*;
        match self {
            BsdiffFormat::Legacy => kind == BZ2,
            BsdiffFormat::Bsdf2 => kind == BZ2 || kind == Brotli,
            BsdiffFormat::Endsley => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BsdiffFormat::Legacy => "legacy",
            BsdiffFormat::Bsdf2 => "bsdf2",
            BsdiffFormat::Endsley => "endsley",
        }
    }
}

impl fmt::Display for BsdiffFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BsdiffFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(BsdiffFormat::Legacy),
            "bsdf2" => Ok(BsdiffFormat::Bsdf2),
            "endsley" => Ok(BsdiffFormat::Endsley),
            _ => Err(Error::invalid_config(format!("unknown patch format `{}`", s))),
        }
    }
}

/// Codec applied to a patch stream.
///
/// The discriminant is the byte stored in BSDF2 headers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CompressorType {
    NoCompression = 0,
    BZ2 = 1,
    Brotli = 2,
}

impl CompressorType {
    /// Byte identifying the codec in a header.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Parses a header codec byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CompressorType::NoCompression),
            1 => Some(CompressorType::BZ2),
            2 => Some(CompressorType::Brotli),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CompressorType::NoCompression => "nocompression",
            CompressorType::BZ2 => "bz2",
            CompressorType::Brotli => "brotli",
        }
    }
}

impl fmt::Display for CompressorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nocompression" | "none" => Ok(CompressorType::NoCompression),
            "bz2" | "bzip2" => Ok(CompressorType::BZ2),
            "brotli" => Ok(CompressorType::Brotli),
            _ => Err(Error::invalid_config(format!("unknown compressor `{}`", s))),
        }
    }
}

/// Parses a colon separated list of codecs, such as `bz2:brotli`.
///
/// Duplicates are dropped, the first occurrence keeps its position.
pub fn parse_compressor_types(s: &str) -> Result<Vec<CompressorType>> {
    let mut types = Vec::new();
    for name in s.split(':') {
        let kind = name.trim().parse::<CompressorType>()?;
        if !types.contains(&kind) {
            types.push(kind);
        }
    }
    Ok(types)
}

/// Guesses the container format from the leading magic bytes.
pub fn detect_format(patch: &[u8]) -> Option<BsdiffFormat> {
    if patch.starts_with(LEGACY_MAGIC) {
        Some(BsdiffFormat::Legacy)
    } else if patch.starts_with(BSDF2_MAGIC) {
        Some(BsdiffFormat::Bsdf2)
    } else if patch.starts_with(ENDSLEY_MAGIC) {
        Some(BsdiffFormat::Endsley)
    } else {
        None
    }
}
