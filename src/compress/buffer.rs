use crate::error::{Error, Result};

/// Scratch size used by every compressor.
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Output accumulator shared by the compressors.
///
/// The codec writes into a fixed scratch buffer; produced bytes are moved into
/// a list of chunks and only concatenated once, when the compressed data is
/// requested for the first time.
pub struct CompressorBuffer {
    scratch: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    data: Vec<u8>,
}

impl CompressorBuffer {
    pub fn new(size: usize) -> Self {
        CompressorBuffer {
            scratch: vec![0; size],
            chunks: Vec::new(),
            data: Vec::new(),
        }
    }

    /// The scratch buffer handed to the codec.
    #[inline]
    pub fn scratch_mut(&mut self) -> &mut [u8] {
        &mut self.scratch[..]
    }

    /// Moves the first `n` bytes of the scratch buffer into a new chunk.
    pub fn add_data_to_chunks(&mut self, n: usize) -> Result<()> {
        if n > self.scratch.len() {
            return Err(Error::codec(format!(
                "{} bytes exceed the {} bytes scratch buffer",
                n,
                self.scratch.len()
            )));
        }
        if n > 0 {
            self.chunks.push(self.scratch[..n].to_vec());
        }
        Ok(())
    }

    /// Concatenates the chunks on the first call, then returns the cached
    /// result.
    pub fn compressed_data(&mut self) -> &[u8] {
        if !self.chunks.is_empty() {
            let size: usize = self.chunks.iter().map(Vec::len).sum();
            self.data.reserve(size);
            for chunk in self.chunks.drain(..) {
                self.data.extend_from_slice(&chunk[..]);
            }
        }
        &self.data[..]
    }
}
