use super::PatchReader;
use crate::compress::{create_decompressor, Decompressor};
use crate::error::{Error, Result};
use crate::format::*;
use crate::utils::*;
use log::{debug, error};

/// Reader of the three stream `BSDIFF40` and `BSDF2` formats.
///
/// Read the whole new file out of a patch:
/// ```
/// use bsdiff_format::{BsdiffPatchReader, PatchReader};
///
/// fn read_patch(patch: &[u8]) -> bsdiff_format::Result<Vec<u8>> {
///     let mut reader = BsdiffPatchReader::new(patch)?;
///     let mut out = Vec::new();
///     while (out.len() as u64) < reader.new_file_size() {
///         let entry = reader.parse_control_entry()?;
///         let start = out.len();
///         out.resize(start + entry.diff_size as usize, 0);
///         reader.read_diff_stream(&mut out[start..])?;
///         let start = out.len();
///         out.resize(start + entry.extra_size as usize, 0);
///         reader.read_extra_stream(&mut out[start..])?;
///     }
///     reader.finish()?;
///     Ok(out)
/// }
/// ```
pub struct BsdiffPatchReader<'a> {
    format: BsdiffFormat,
    types: [CompressorType; 3],
    new_size: u64,
    ctrl: Box<dyn Decompressor<'a> + 'a>,
    diff: Box<dyn Decompressor<'a> + 'a>,
    extra: Box<dyn Decompressor<'a> + 'a>,
    finished: bool,
}

impl<'a> BsdiffPatchReader<'a> {
    /// Parses the patch header and binds one decompressor to each stream.
    pub fn new(patch: &'a [u8]) -> Result<Self> {
        if patch.len() < BSDIFF_HEADER_SIZE {
            error!("patch too short: {} bytes", patch.len());
            return Err(Error::format("patch is shorter than its header"));
        }

        let (format, types) = if patch.starts_with(LEGACY_MAGIC) {
            (BsdiffFormat::Legacy, [CompressorType::BZ2; 3])
        } else if patch.starts_with(BSDF2_MAGIC) {
            let mut types = [CompressorType::BZ2; 3];
            for (i, kind) in types.iter_mut().enumerate() {
                let b = patch[BSDF2_MAGIC.len() + i];
                *kind = match CompressorType::from_byte(b) {
                    Some(k) if BsdiffFormat::Bsdf2.supports(k) => k,
                    _ => {
                        error!("unsupported codec byte {} for stream {}", b, i);
                        return Err(Error::format(format!("unsupported codec byte {}", b)));
                    }
                };
            }
            (BsdiffFormat::Bsdf2, types)
        } else {
            error!("unrecognized patch magic");
            return Err(Error::format("not a bsdiff patch"));
        };

        let ctrl_len = decode_int(&patch[8..16]);
        let diff_len = decode_int(&patch[16..24]);
        let new_size = decode_int(&patch[24..32]);
        if ctrl_len < 0 || diff_len < 0 || new_size < 0 {
            error!(
                "negative header field: ctrl {} diff {} new size {}",
                ctrl_len, diff_len, new_size
            );
            return Err(Error::format("corrupt patch header"));
        }
        let ctrl_end = (BSDIFF_HEADER_SIZE as u64).checked_add(ctrl_len as u64);
        let diff_end = ctrl_end.and_then(|n| n.checked_add(diff_len as u64));
        let (ctrl_end, diff_end) = match (ctrl_end, diff_end) {
            (Some(c), Some(d)) if d <= patch.len() as u64 => (c as usize, d as usize),
            _ => {
                error!(
                    "streams of {} and {} bytes exceed a patch of {} bytes",
                    ctrl_len,
                    diff_len,
                    patch.len()
                );
                return Err(Error::format("patch is truncated"));
            }
        };

        let mut ctrl = create_decompressor(types[0]);
        let mut diff = create_decompressor(types[1]);
        let mut extra = create_decompressor(types[2]);
        ctrl.set_input_data(&patch[BSDIFF_HEADER_SIZE..ctrl_end])?;
        diff.set_input_data(&patch[ctrl_end..diff_end])?;
        extra.set_input_data(&patch[diff_end..])?;

        debug!(
            "{} patch, codecs {}/{}/{}, new size {}",
            format, types[0], types[1], types[2], new_size
        );
        Ok(BsdiffPatchReader {
            format,
            types,
            new_size: new_size as u64,
            ctrl,
            diff,
            extra,
            finished: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.finished {
            Err(Error::sequence("patch reader is finished"))
        } else {
            Ok(())
        }
    }
}

impl<'a> PatchReader for BsdiffPatchReader<'a> {
    fn format(&self) -> BsdiffFormat {
        self.format
    }

    fn compressor_types(&self) -> &[CompressorType] {
        &self.types[..]
    }

    fn new_file_size(&self) -> u64 {
        self.new_size
    }

    fn parse_control_entry(&mut self) -> Result<ControlEntry> {
        self.check_open()?;
        let mut b = [0; CONTROL_ENTRY_SIZE];
        self.ctrl.read(&mut b[..])?;
        ControlEntry::decode(&b)
    }

    fn read_diff_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        self.diff.read(buf)
    }

    fn read_extra_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        self.extra.read(buf)
    }

    fn finish(&mut self) -> Result<()> {
        self.check_open()?;
        self.finished = true;
        self.ctrl.close()?;
        self.diff.close()?;
        self.extra.close()
    }
}
