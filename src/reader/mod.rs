/*!
Patch readers, the consuming side of the containers.

A reader is driven in control entry order: `parse_control_entry`, then
exactly `diff_size` bytes of diff data, then exactly `extra_size` bytes of
extra data, until the new file is complete, then `finish`.
*/

mod bsdiff;
mod endsley;

pub use self::bsdiff::BsdiffPatchReader;
pub use self::endsley::EndsleyPatchReader;

use crate::error::{Error, Result};
use crate::format::{detect_format, BsdiffFormat, CompressorType};
use crate::utils::ControlEntry;
use log::error;

/// Consumer of a patch container.
pub trait PatchReader {
    /// Container format of the patch.
    fn format(&self) -> BsdiffFormat;

    /// Codecs of the streams: control, diff and extra for the three stream
    /// formats, the single body codec for Endsley.
    fn compressor_types(&self) -> &[CompressorType];

    /// Size of the new file declared in the header.
    fn new_file_size(&self) -> u64;

    /// Reads and decodes the next control entry.
    fn parse_control_entry(&mut self) -> Result<ControlEntry>;

    /// Reads exactly `buf.len()` bytes of diff data.
    fn read_diff_stream(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads exactly `buf.len()` bytes of extra data.
    fn read_extra_stream(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Checks that every stream was consumed completely.
    fn finish(&mut self) -> Result<()>;
}

impl<P: PatchReader + ?Sized> PatchReader for Box<P> {
    fn format(&self) -> BsdiffFormat {
        (**self).format()
    }

    fn compressor_types(&self) -> &[CompressorType] {
        (**self).compressor_types()
    }

    fn new_file_size(&self) -> u64 {
        (**self).new_file_size()
    }

    fn parse_control_entry(&mut self) -> Result<ControlEntry> {
        (**self).parse_control_entry()
    }

    fn read_diff_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_diff_stream(buf)
    }

    fn read_extra_stream(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_extra_stream(buf)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Opens a patch of any known format.
///
/// Endsley patches do not record their codec, `endsley_codec` is used for
/// them and ignored otherwise.
pub fn open_patch<'a>(
    patch: &'a [u8],
    endsley_codec: CompressorType,
) -> Result<Box<dyn PatchReader + 'a>> {
    match detect_format(patch) {
        Some(BsdiffFormat::Legacy) | Some(BsdiffFormat::Bsdf2) => {
            Ok(Box::new(BsdiffPatchReader::new(patch)?))
        }
        Some(BsdiffFormat::Endsley) => Ok(Box::new(EndsleyPatchReader::new(patch, endsley_codec)?)),
        None => {
            error!("unrecognized patch magic");
            Err(Error::format("unknown patch format"))
        }
    }
}
