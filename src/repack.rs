//! Conversion between container formats.

use super::error::{Error, Result};
use super::reader::PatchReader;
use super::writer::PatchWriter;
use log::{debug, error};

/// Copy buffer size.
pub const REPACK_BUFFER_SIZE: usize = 64 * 1024;

/// Streams every control entry and its data from `reader` into `writer`.
///
/// Returns the size of the new file. Both ends are finished on success.
///
/// Convert any patch into a BSDF2 patch using Brotli:
/// ```
/// use bsdiff_format::{open_patch, repack, BsdiffFormat, CompressorType, PatchConfig};
///
/// fn to_bsdf2(patch: &[u8]) -> bsdiff_format::Result<Vec<u8>> {
///     let mut out = Vec::new();
///     let mut reader = open_patch(patch, CompressorType::NoCompression)?;
///     let mut writer = PatchConfig::new(BsdiffFormat::Bsdf2)
///         .compressor(CompressorType::Brotli)
///         .writer(&mut out)?;
///     repack(&mut reader, &mut writer)?;
///     drop(writer);
///     Ok(out)
/// }
/// ```
pub fn repack<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: PatchReader + ?Sized,
    W: PatchWriter + ?Sized,
{
    let new_size = reader.new_file_size();
    writer.init(new_size)?;

    let mut buf = vec![0; REPACK_BUFFER_SIZE];
    let mut written = 0u64;
    let mut entries = 0u64;
    while written < new_size {
        let entry = reader.parse_control_entry()?;
        writer.add_control_entry(entry)?;
        written = written
            .checked_add(entry.output_size())
            .filter(|&n| n <= new_size)
            .ok_or_else(|| {
                error!("entry {} overruns the new size {}", entries, new_size);
                Error::format("control entries exceed the new file size")
            })?;
        entries += 1;

        copy(entry.diff_size, &mut buf[..], |b| reader.read_diff_stream(b), |b| {
            writer.write_diff_stream(b)
        })?;
        copy(entry.extra_size, &mut buf[..], |b| reader.read_extra_stream(b), |b| {
            writer.write_extra_stream(b)
        })?;
    }

    reader.finish()?;
    writer.close()?;
    debug!("repacked {} entries, {} bytes of new file", entries, new_size);
    Ok(new_size)
}

fn copy<F, G>(mut size: u64, buf: &mut [u8], mut read: F, mut write: G) -> Result<()>
where
    F: FnMut(&mut [u8]) -> Result<()>,
    G: FnMut(&[u8]) -> Result<()>,
{
    while size > 0 {
        let n = Ord::min(size, buf.len() as u64) as usize;
        read(&mut buf[..n])?;
        write(&buf[..n])?;
        size -= n as u64;
    }
    Ok(())
}
