use super::PatchWriter;
use crate::compress::{create_compressor, Compressor};
use crate::config::PatchConfig;
use crate::error::{Error, Result};
use crate::format::*;
use crate::utils::*;
use log::{debug, error};
use std::io::Write;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Created,
    Initialized,
    Closed,
}

/// Writer of the three stream formats (`BSDIFF40` and `BSDF2`).
///
/// Control entries, diff data and extra data are compressed independently.
/// The header depends on the compressed sizes, so nothing reaches the sink
/// before `close`.
///
/// Write a legacy bsdiff 4.x patch:
/// ```
/// use bsdiff_format::{BsdiffPatchWriter, ControlEntry, PatchWriter};
///
/// fn write_patch() -> bsdiff_format::Result<Vec<u8>> {
///     let mut writer = BsdiffPatchWriter::new(Vec::new());
///     writer.init(10)?;
///     writer.add_control_entry(ControlEntry::new(5, 5, -2))?;
///     writer.write_diff_stream(&[0, 0, 1, 0, 0])?;
///     writer.write_extra_stream(b"FGHIJ")?;
///     writer.close()?;
///     Ok(writer.into_inner())
/// }
/// # assert!(write_patch().unwrap().starts_with(b"BSDIFF40"));
/// ```
pub struct BsdiffPatchWriter<W: Write> {
    sink: W,
    format: BsdiffFormat,
    ctrl: Vec<Box<dyn Compressor>>,
    diff: Vec<Box<dyn Compressor>>,
    extra: Vec<Box<dyn Compressor>>,
    written_output: u64,
    state: State,
}

impl<W: Write> BsdiffPatchWriter<W> {
    /// Creates a legacy bsdiff 4.x writer (three bzip2 streams).
    pub fn new(sink: W) -> Self {
        let config = PatchConfig::new(BsdiffFormat::Legacy);
        let (ctrl, diff, extra) = create_streams(&config);
        BsdiffPatchWriter {
            sink,
            format: BsdiffFormat::Legacy,
            ctrl,
            diff,
            extra,
            written_output: 0,
            state: State::Created,
        }
    }

    /// Creates a writer for the legacy or BSDF2 format.
    ///
    /// With several codecs, every stream is compressed with each of them and
    /// the smallest result is kept.
    pub fn with_config(sink: W, config: &PatchConfig) -> Result<Self> {
        config.validate()?;
        if config.format() == BsdiffFormat::Endsley {
            return Err(Error::invalid_config(
                "endsley patches are written by EndsleyPatchWriter",
            ));
        }
        let (ctrl, diff, extra) = create_streams(config);
        Ok(BsdiffPatchWriter {
            sink,
            format: config.format(),
            ctrl,
            diff,
            extra,
            written_output: 0,
            state: State::Created,
        })
    }

    /// Bytes of new file declared by the control entries so far.
    pub fn written_output(&self) -> u64 {
        self.written_output
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn check_writable(&self) -> Result<()> {
        match self.state {
            State::Initialized => Ok(()),
            State::Created => Err(Error::sequence("patch writer is not initialized")),
            State::Closed => Err(Error::sequence("patch writer is closed")),
        }
    }
}

type Streams = (
    Vec<Box<dyn Compressor>>,
    Vec<Box<dyn Compressor>>,
    Vec<Box<dyn Compressor>>,
);

fn create_streams(config: &PatchConfig) -> Streams {
    let make = || -> Vec<Box<dyn Compressor>> {
        config
            .compressor_types()
            .iter()
            .filter_map(|&kind| create_compressor(kind, config.quality()))
            .collect()
    };
    (make(), make(), make())
}

/// Writes to every candidate compressor of a stream.
fn write_all(compressors: &mut [Box<dyn Compressor>], data: &[u8]) -> Result<()> {
    for c in compressors.iter_mut() {
        c.write(data)?;
    }
    Ok(())
}

/// Finishes the candidates and returns the index of the smallest result.
fn finish_smallest(compressors: &mut [Box<dyn Compressor>], name: &str) -> Result<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, c) in compressors.iter_mut().enumerate() {
        c.finish().map_err(|e| {
            error!("failed to finish the {} stream: {}", name, e);
            e
        })?;
        let size = c.compressed_data().len();
        debug!("{} stream: {} bytes with {}", name, size, c.compressor_type());
        if best.map_or(true, |(_, n)| size < n) {
            best = Some((i, size));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| Error::invalid_config("no compressor for the stream"))
}

impl<W: Write> PatchWriter for BsdiffPatchWriter<W> {
    fn init(&mut self, _new_size: u64) -> Result<()> {
        if self.state != State::Created {
            return Err(Error::sequence("patch writer initialized twice"));
        }
        if self.ctrl.is_empty() || self.diff.is_empty() || self.extra.is_empty() {
            return Err(Error::invalid_config("no compressor available"));
        }
        self.state = State::Initialized;
        Ok(())
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        write_all(&mut self.diff[..], data)
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        write_all(&mut self.extra[..], data)
    }

    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()> {
        self.check_writable()?;
        let b = entry.encode()?;
        write_all(&mut self.ctrl[..], &b[..])?;
        self.written_output = self
            .written_output
            .checked_add(entry.output_size())
            .filter(|&n| n <= i64::MAX as u64)
            .ok_or_else(|| Error::sequence("declared output size overflows"))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.check_writable()?;
        self.state = State::Closed;

        let ci = finish_smallest(&mut self.ctrl[..], "control")?;
        let di = finish_smallest(&mut self.diff[..], "diff")?;
        let ei = finish_smallest(&mut self.extra[..], "extra")?;

        let mut header = [0; BSDIFF_HEADER_SIZE];
        match self.format {
            BsdiffFormat::Bsdf2 => {
                header[0..5].copy_from_slice(BSDF2_MAGIC);
                header[5] = self.ctrl[ci].compressor_type().to_byte();
                header[6] = self.diff[di].compressor_type().to_byte();
                header[7] = self.extra[ei].compressor_type().to_byte();
            }
            _ => header[0..8].copy_from_slice(LEGACY_MAGIC),
        }

        let ctrl = self.ctrl[ci].compressed_data();
        let diff = self.diff[di].compressed_data();
        let extra = self.extra[ei].compressed_data();
        encode_int(ctrl.len() as i64, &mut header[8..16]);
        encode_int(diff.len() as i64, &mut header[16..24]);
        encode_int(self.written_output as i64, &mut header[24..32]);

        // Write header, compressed controls, diff data and extra data.
        self.sink.write_all(&header[..])?;
        self.sink.write_all(ctrl)?;
        self.sink.write_all(diff)?;
        self.sink.write_all(extra)?;
        self.sink.flush()?;
        debug!(
            "{} patch written: {} + {} + {} + {} bytes",
            self.format,
            BSDIFF_HEADER_SIZE,
            ctrl.len(),
            diff.len(),
            extra.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::create_decompressor;

    fn sample_patch(config: &PatchConfig) -> Vec<u8> {
        let mut writer = BsdiffPatchWriter::with_config(Vec::new(), config).unwrap();
        writer.init(15).unwrap();
        writer.add_control_entry(ControlEntry::new(5, 5, -2)).unwrap();
        writer.write_diff_stream(b"\x01\x02").unwrap();
        writer.write_diff_stream(b"\x03\x04\x05").unwrap();
        writer.write_extra_stream(b"FGHIJ").unwrap();
        writer.add_control_entry(ControlEntry::new(0, 5, 1024)).unwrap();
        writer.write_extra_stream(b"KLMNO").unwrap();
        assert_eq!(writer.written_output(), 15);
        writer.close().unwrap();
        writer.into_inner()
    }

    fn stream(patch: &[u8], kind: CompressorType, range: std::ops::Range<usize>, n: usize) -> Vec<u8> {
        let mut d = create_decompressor(kind);
        d.set_input_data(&patch[range]).unwrap();
        let mut out = vec![0; n];
        d.read(&mut out[..]).unwrap();
        d.close().unwrap();
        out
    }

    #[test]
    fn legacy_layout() {
        let patch = sample_patch(&PatchConfig::new(BsdiffFormat::Legacy));
        assert_eq!(&patch[0..8], b"BSDIFF40");
        let csize = decode_int(&patch[8..16]) as usize;
        let dsize = decode_int(&patch[16..24]) as usize;
        assert_eq!(decode_int(&patch[24..32]), 15);

        let c = stream(&patch, CompressorType::BZ2, 32..32 + csize, 48);
        let mut expected = Vec::new();
        expected.extend_from_slice(&ControlEntry::new(5, 5, -2).encode().unwrap());
        expected.extend_from_slice(&ControlEntry::new(0, 5, 1024).encode().unwrap());
        assert_eq!(c, expected);

        let d = stream(&patch, CompressorType::BZ2, 32 + csize..32 + csize + dsize, 5);
        assert_eq!(d, b"\x01\x02\x03\x04\x05");
        let e = stream(&patch, CompressorType::BZ2, 32 + csize + dsize..patch.len(), 10);
        assert_eq!(e, b"FGHIJKLMNO");
    }

    #[test]
    fn bsdf2_codec_bytes() {
        let config = PatchConfig::new(BsdiffFormat::Bsdf2).compressor(CompressorType::Brotli);
        let patch = sample_patch(&config);
        assert_eq!(&patch[0..5], b"BSDF2");
        assert_eq!(&patch[5..8], &[2, 2, 2]);

        let config = PatchConfig::new(BsdiffFormat::Bsdf2);
        let patch = sample_patch(&config);
        assert_eq!(&patch[5..8], &[1, 1, 1]);
    }

    #[test]
    fn bsdf2_keeps_smallest_stream() {
        let config = PatchConfig::new(BsdiffFormat::Bsdf2)
            .compressors(&[CompressorType::BZ2, CompressorType::Brotli]);
        let patch = sample_patch(&config);
        // Brotli beats bzip2 on tiny inputs.
        assert_eq!(&patch[5..8], &[2, 2, 2]);

        let brotli = sample_patch(
            &PatchConfig::new(BsdiffFormat::Bsdf2).compressor(CompressorType::Brotli),
        );
        assert_eq!(patch, brotli);
    }

    #[test]
    fn call_sequence() {
        let mut writer = BsdiffPatchWriter::new(Vec::new());
        assert!(writer.write_diff_stream(b"x").is_err());
        assert!(writer.close().is_err());
        writer.init(0).unwrap();
        assert!(writer.init(0).is_err());
        writer.close().unwrap();
        assert!(writer.close().is_err());
        assert!(writer.add_control_entry(ControlEntry::default()).is_err());
        assert!(writer.into_inner().starts_with(b"BSDIFF40"));
    }

    #[test]
    fn endsley_config_rejected() {
        let config = PatchConfig::new(BsdiffFormat::Endsley);
        assert!(BsdiffPatchWriter::with_config(Vec::new(), &config).is_err());
    }

    #[test]
    fn failing_sink() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut writer = BsdiffPatchWriter::new(Broken);
        writer.init(0).unwrap();
        match writer.close() {
            Err(Error::Io(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
