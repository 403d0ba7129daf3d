/*!
Streaming codecs behind one capability interface per direction.

Every compressor accumulates its whole output in memory, every decompressor
decodes from a borrowed slice that must outlive it.
*/

mod brotli;
mod buffer;
mod bz2;
mod raw;

pub use self::brotli::{BrotliCompressor, BrotliDecompressor, BROTLI_LGWIN, BROTLI_MAX_QUALITY};
pub use self::buffer::{CompressorBuffer, BUFFER_SIZE};
pub use self::bz2::{Bz2Compressor, Bz2Decompressor};
pub use self::raw::RawDecompressor;

use crate::error::Result;
use crate::format::CompressorType;

/// Streaming compressor.
pub trait Compressor {
    /// Feeds uncompressed data.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flushes and terminates the compressed stream.
    fn finish(&mut self) -> Result<()>;

    /// The compressed stream, complete only after `finish` succeeded.
    fn compressed_data(&mut self) -> &[u8];

    /// Codec implemented by this compressor.
    fn compressor_type(&self) -> CompressorType;
}

/// Streaming decompressor over a borrowed input buffer.
pub trait Decompressor<'a> {
    /// Binds the compressed input. The slice stays borrowed until the
    /// decompressor is dropped.
    fn set_input_data(&mut self, input: &'a [u8]) -> Result<()>;

    /// Decompresses exactly `buf.len()` bytes.
    ///
    /// Fails if the stream ends early or is corrupted.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Checks that the stream was consumed completely.
    fn close(&mut self) -> Result<()>;
}

/// Creates a compressor, `None` for `NoCompression`.
pub fn create_compressor(kind: CompressorType, brotli_quality: u32) -> Option<Box<dyn Compressor>> {
    match kind {
        CompressorType::NoCompression => None,
        CompressorType::BZ2 => Some(Box::new(Bz2Compressor::new())),
        CompressorType::Brotli => Some(Box::new(BrotliCompressor::new(brotli_quality))),
    }
}

/// Creates a decompressor, a pass-through one for `NoCompression`.
pub fn create_decompressor<'a>(kind: CompressorType) -> Box<dyn Decompressor<'a> + 'a> {
    match kind {
        CompressorType::NoCompression => Box::new(RawDecompressor::new()),
        CompressorType::BZ2 => Box::new(Bz2Decompressor::new()),
        CompressorType::Brotli => Box::new(BrotliDecompressor::new()),
    }
}

/// Compresses a whole buffer at once.
pub fn compress_all(kind: CompressorType, brotli_quality: u32, data: &[u8]) -> Result<Vec<u8>> {
    match create_compressor(kind, brotli_quality) {
        Some(mut c) => {
            c.write(data)?;
            c.finish()?;
            Ok(c.compressed_data().to_vec())
        }
        None => Ok(data.to_vec()),
    }
}
