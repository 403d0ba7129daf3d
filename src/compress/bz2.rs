use super::buffer::{CompressorBuffer, BUFFER_SIZE};
use super::{Compressor, Decompressor};
use crate::error::{Error, Result};
use crate::format::CompressorType;
use bzip2::{Action, Compress, Compression, Decompress, Status};
use log::error;

/// Default bzip2 work factor.
const WORK_FACTOR: u32 = 0;

/// bzip2 compressor using the best block size (900k).
pub struct Bz2Compressor {
    stream: Compress,
    buffer: CompressorBuffer,
    finished: bool,
}

impl Bz2Compressor {
    pub fn new() -> Self {
        Bz2Compressor {
            stream: Compress::new(Compression::best(), WORK_FACTOR),
            buffer: CompressorBuffer::new(BUFFER_SIZE),
            finished: false,
        }
    }

    /// Runs the codec once, moving its output into the chunk list.
    /// Returns (consumed, produced, status).
    fn step(&mut self, input: &[u8], action: Action) -> Result<(usize, usize, Status)> {
        let in0 = self.stream.total_in();
        let out0 = self.stream.total_out();
        let status = self
            .stream
            .compress(input, self.buffer.scratch_mut(), action)
            .map_err(|e| {
                error!("bzip2 compression failed: {}", e);
                e
            })?;
        let consumed = (self.stream.total_in() - in0) as usize;
        let produced = (self.stream.total_out() - out0) as usize;
        self.buffer.add_data_to_chunks(produced)?;
        Ok((consumed, produced, status))
    }
}

impl Default for Bz2Compressor {
    fn default() -> Self {
        Bz2Compressor::new()
    }
}

impl Compressor for Bz2Compressor {
    fn write(&mut self, mut buf: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::sequence("bzip2 stream already finished"));
        }
        while !buf.is_empty() {
            let (consumed, produced, _) = self.step(buf, Action::Run)?;
            if consumed == 0 && produced == 0 {
                error!("bzip2 compressor made no progress");
                return Err(Error::codec("bzip2 compressor stalled"));
            }
            buf = &buf[consumed..];
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        while !self.finished {
            let (_, _, status) = self.step(&[], Action::Finish)?;
            if let Status::StreamEnd = status {
                self.finished = true;
            }
        }
        Ok(())
    }

    fn compressed_data(&mut self) -> &[u8] {
        self.buffer.compressed_data()
    }

    fn compressor_type(&self) -> CompressorType {
        CompressorType::BZ2
    }
}

/// bzip2 decompressor.
pub struct Bz2Decompressor<'a> {
    stream: Decompress,
    input: &'a [u8],
    finished: bool,
}

impl<'a> Bz2Decompressor<'a> {
    pub fn new() -> Self {
        Bz2Decompressor {
            stream: Decompress::new(false),
            input: &[],
            finished: false,
        }
    }

    /// Runs the codec once, returns (consumed, produced, status).
    fn step(&mut self, buf: &mut [u8]) -> Result<(usize, usize, Status)> {
        let pos = self.stream.total_in() as usize;
        let out0 = self.stream.total_out();
        let status = self.stream.decompress(&self.input[pos..], buf).map_err(|e| {
            error!("bzip2 decompression failed: {}", e);
            e
        })?;
        let consumed = self.stream.total_in() as usize - pos;
        let produced = (self.stream.total_out() - out0) as usize;
        Ok((consumed, produced, status))
    }
}

impl<'a> Default for Bz2Decompressor<'a> {
    fn default() -> Self {
        Bz2Decompressor::new()
    }
}

impl<'a> Decompressor<'a> for Bz2Decompressor<'a> {
    fn set_input_data(&mut self, input: &'a [u8]) -> Result<()> {
        self.stream = Decompress::new(false);
        self.input = input;
        self.finished = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.finished {
                error!("bzip2 stream ended {} bytes short", buf.len() - filled);
                return Err(Error::codec("bzip2 stream ended before the requested data"));
            }
            let (consumed, produced, status) = self.step(&mut buf[filled..])?;
            filled += produced;
            match status {
                Status::StreamEnd => self.finished = true,
                _ if consumed == 0 && produced == 0 => {
                    error!("truncated bzip2 stream, {} bytes missing", buf.len() - filled);
                    return Err(Error::codec("truncated bzip2 stream"));
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.finished {
            if self.input.is_empty() {
                return Ok(());
            }
            // Consume the end of stream marker, if not yet seen.
            let mut probe = [0; 1];
            while !self.finished {
                let (consumed, produced, status) = self.step(&mut probe[..])?;
                if produced > 0 {
                    error!("bzip2 stream holds more data than was read");
                    return Err(Error::codec("unread data in bzip2 stream"));
                }
                match status {
                    Status::StreamEnd => self.finished = true,
                    _ if consumed == 0 => {
                        return Err(Error::codec("bzip2 stream is not terminated"));
                    }
                    _ => (),
                }
            }
        }
        let remaining = self.input.len() - self.stream.total_in() as usize;
        if remaining > 0 {
            error!("{} bytes left after the bzip2 stream", remaining);
            return Err(Error::codec("trailing bytes after bzip2 stream"));
        }
        Ok(())
    }
}
