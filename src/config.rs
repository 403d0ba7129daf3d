use super::compress::BROTLI_MAX_QUALITY;
use super::error::{Error, Result};
use super::format::{BsdiffFormat, CompressorType};
use super::writer::{BsdiffPatchWriter, EndsleyPatchWriter, PatchWriter};
use log::error;
use std::io::Write;

/// Default Brotli quality.
pub const DEFAULT_BROTLI_QUALITY: u32 = 9;

/// Configuration of a patch writer.
///
/// Create a BSDF2 patch whose streams are each compressed with whichever of
/// bzip2 or Brotli does better:
/// ```
/// use bsdiff_format::{BsdiffFormat, CompressorType, ControlEntry, PatchConfig};
///
/// fn write_patch() -> bsdiff_format::Result<Vec<u8>> {
///     let mut patch = Vec::new();
///     {
///         let mut writer = PatchConfig::new(BsdiffFormat::Bsdf2)
///             .compressors(&[CompressorType::BZ2, CompressorType::Brotli])
///             .brotli_quality(11)
///             .writer(&mut patch)?;
///         writer.init(5)?;
///         writer.add_control_entry(ControlEntry::new(2, 3, 0))?;
///         writer.write_diff_stream(&[0, 0])?;
///         writer.write_extra_stream(b"xyz")?;
///         writer.close()?;
///     }
///     Ok(patch)
/// }
/// # assert!(write_patch().unwrap().starts_with(b"BSDF2"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatchConfig {
    format: BsdiffFormat,
    types: Vec<CompressorType>,
    quality: u32,
}

impl PatchConfig {
    /// Creates a configuration with the conventional codec of the format:
    /// bzip2 for the legacy and BSDF2 formats, none for Endsley.
    pub fn new(format: BsdiffFormat) -> Self {
        let kind = match format {
            BsdiffFormat::Legacy | BsdiffFormat::Bsdf2 => CompressorType::BZ2,
            BsdiffFormat::Endsley => CompressorType::NoCompression,
        };
        PatchConfig {
            format,
            types: vec![kind],
            quality: DEFAULT_BROTLI_QUALITY,
        }
    }

    /// Use a single codec.
    pub fn compressor(mut self, kind: CompressorType) -> Self {
        self.types = vec![kind];
        self
    }

    /// Use several codecs; BSDF2 keeps the smallest result of each stream.
    pub fn compressors(mut self, types: &[CompressorType]) -> Self {
        self.types.clear();
        for &kind in types.iter() {
            if !self.types.contains(&kind) {
                self.types.push(kind);
            }
        }
        self
    }

    /// Set the Brotli quality (`0..=11`, default is `DEFAULT_BROTLI_QUALITY`).
    pub fn brotli_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn format(&self) -> BsdiffFormat {
        self.format
    }

    pub fn compressor_types(&self) -> &[CompressorType] {
        &self.types[..]
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Checks that the format accepts the requested codecs.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            error!("{}", msg);
            Err(Error::invalid_config(msg))
        };

        if self.types.is_empty() {
            return fail("no compressor requested".to_string());
        }
        if self.types.contains(&CompressorType::Brotli) && self.quality > BROTLI_MAX_QUALITY {
            return fail(format!(
                "brotli quality {} is out of range 0..={}",
                self.quality, BROTLI_MAX_QUALITY
            ));
        }
        if let Some(&kind) = self.types.iter().find(|&&kind| !self.format.supports(kind)) {
            return fail(format!("{} patches cannot use {}", self.format, kind));
        }
        match self.format {
            BsdiffFormat::Legacy | BsdiffFormat::Endsley if self.types.len() != 1 => fail(format!(
                "{} patches use exactly one compressor, {} requested",
                self.format,
                self.types.len()
            )),
            _ => Ok(()),
        }
    }

    /// Validates the configuration and creates a writer into `sink`.
    pub fn writer<'w, W: Write + 'w>(&self, sink: W) -> Result<Box<dyn PatchWriter + 'w>> {
        self.validate()?;
        match self.format {
            BsdiffFormat::Legacy | BsdiffFormat::Bsdf2 => Ok(Box::new(
                BsdiffPatchWriter::with_config(sink, self)?,
            )),
            BsdiffFormat::Endsley => Ok(Box::new(EndsleyPatchWriter::new(
                sink,
                self.types[0],
                self.quality,
            ))),
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        PatchConfig::new(BsdiffFormat::Legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BsdiffFormat::*;
    use CompressorType::*;

    #[test]
    fn legacy_requires_bz2() {
        assert!(PatchConfig::new(Legacy).validate().is_ok());
        assert!(PatchConfig::new(Legacy).compressor(Brotli).validate().is_err());
        assert!(PatchConfig::new(Legacy).compressor(NoCompression).validate().is_err());
        assert!(PatchConfig::new(Legacy)
            .compressors(&[BZ2, Brotli])
            .validate()
            .is_err());
    }

    #[test]
    fn bsdf2_codecs() {
        assert!(PatchConfig::new(Bsdf2).compressor(Brotli).validate().is_ok());
        assert!(PatchConfig::new(Bsdf2)
            .compressors(&[Brotli, BZ2])
            .validate()
            .is_ok());
        assert!(PatchConfig::new(Bsdf2)
            .compressor(Brotli)
            .brotli_quality(12)
            .validate()
            .is_err());
        assert!(PatchConfig::new(Bsdf2)
            .compressor(BZ2)
            .brotli_quality(12)
            .validate()
            .is_ok());
        assert!(PatchConfig::new(Bsdf2)
            .compressors(&[BZ2, NoCompression])
            .validate()
            .is_err());
        assert!(PatchConfig::new(Bsdf2).compressors(&[]).validate().is_err());
    }

    #[test]
    fn endsley_single_codec() {
        for &kind in [NoCompression, BZ2, Brotli].iter() {
            assert!(PatchConfig::new(Endsley).compressor(kind).validate().is_ok());
        }
        assert!(PatchConfig::new(Endsley)
            .compressors(&[BZ2, Brotli])
            .validate()
            .is_err());
    }

    #[test]
    fn duplicates_collapse() {
        let config = PatchConfig::new(Legacy).compressors(&[BZ2, BZ2]);
        assert_eq!(config.compressor_types(), &[BZ2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_config_has_no_writer() {
        let mut sink = Vec::new();
        assert!(PatchConfig::new(Legacy)
            .compressor(Brotli)
            .writer(&mut sink)
            .is_err());
        assert!(sink.is_empty());
    }
}
