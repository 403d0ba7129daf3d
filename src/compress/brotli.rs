use super::buffer::{CompressorBuffer, BUFFER_SIZE};
use super::{Compressor, Decompressor};
use crate::error::{Error, Result};
use crate::format::CompressorType;
use ::brotli::enc::encode::{
    BrotliEncoderCompressStream, BrotliEncoderCreateInstance, BrotliEncoderIsFinished,
    BrotliEncoderOperation, BrotliEncoderParameter, BrotliEncoderSetParameter,
    BrotliEncoderStateStruct,
};
use ::brotli::enc::StandardAlloc;
use ::brotli::{BrotliDecompressStream, BrotliResult, BrotliState};
use log::{error, warn};

/// Highest Brotli quality.
pub const BROTLI_MAX_QUALITY: u32 = 11;

/// Sliding window size (log2) used for every Brotli stream.
pub const BROTLI_LGWIN: u32 = 20;

/// Brotli compressor.
pub struct BrotliCompressor {
    state: BrotliEncoderStateStruct<StandardAlloc>,
    buffer: CompressorBuffer,
    finished: bool,
}

impl BrotliCompressor {
    /// Creates a compressor, out of range qualities fall back to the maximum.
    pub fn new(mut quality: u32) -> Self {
        if quality > BROTLI_MAX_QUALITY {
            warn!(
                "invalid brotli quality {}, using {} instead",
                quality, BROTLI_MAX_QUALITY
            );
            quality = BROTLI_MAX_QUALITY;
        }
        let mut state = BrotliEncoderCreateInstance(StandardAlloc::default());
        BrotliEncoderSetParameter(
            &mut state,
            BrotliEncoderParameter::BROTLI_PARAM_QUALITY,
            quality,
        );
        BrotliEncoderSetParameter(
            &mut state,
            BrotliEncoderParameter::BROTLI_PARAM_LGWIN,
            BROTLI_LGWIN,
        );
        BrotliCompressor {
            state,
            buffer: CompressorBuffer::new(BUFFER_SIZE),
            finished: false,
        }
    }

    /// Runs the encoder once, returns (consumed, produced).
    fn step(&mut self, op: BrotliEncoderOperation, input: &[u8]) -> Result<(usize, usize)> {
        let mut avail_in = input.len();
        let mut in_offset = 0;
        let scratch = self.buffer.scratch_mut();
        let mut avail_out = scratch.len();
        let mut out_offset = 0;
        let mut total_out = None;
        let ok = BrotliEncoderCompressStream(
            &mut self.state,
            op,
            &mut avail_in,
            input,
            &mut in_offset,
            &mut avail_out,
            scratch,
            &mut out_offset,
            &mut total_out,
            &mut |_, _, _, _| (),
        );
        if ok == 0 {
            error!("brotli encoder failed");
            return Err(Error::codec("brotli encoder failed"));
        }
        self.buffer.add_data_to_chunks(out_offset)?;
        Ok((in_offset, out_offset))
    }
}

impl Compressor for BrotliCompressor {
    fn write(&mut self, mut buf: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::sequence("brotli stream already finished"));
        }
        while !buf.is_empty() {
            let (consumed, produced) =
                self.step(BrotliEncoderOperation::BROTLI_OPERATION_PROCESS, buf)?;
            if consumed == 0 && produced == 0 {
                error!("brotli encoder made no progress");
                return Err(Error::codec("brotli encoder stalled"));
            }
            buf = &buf[consumed..];
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        while !self.finished {
            self.step(BrotliEncoderOperation::BROTLI_OPERATION_FINISH, &[])?;
            self.finished = BrotliEncoderIsFinished(&self.state) != 0;
        }
        Ok(())
    }

    fn compressed_data(&mut self) -> &[u8] {
        self.buffer.compressed_data()
    }

    fn compressor_type(&self) -> CompressorType {
        CompressorType::Brotli
    }
}

/// Brotli decompressor.
pub struct BrotliDecompressor<'a> {
    state: BrotliState<StandardAlloc, StandardAlloc, StandardAlloc>,
    input: &'a [u8],
    in_offset: usize,
    total_out: usize,
    finished: bool,
}

impl<'a> BrotliDecompressor<'a> {
    pub fn new() -> Self {
        BrotliDecompressor {
            state: new_decoder_state(),
            input: &[],
            in_offset: 0,
            total_out: 0,
            finished: false,
        }
    }

    /// Runs the decoder once, returns (produced, result).
    fn step(&mut self, buf: &mut [u8]) -> (usize, BrotliResult) {
        let mut avail_in = self.input.len() - self.in_offset;
        let mut avail_out = buf.len();
        let mut out_offset = 0;
        let result = BrotliDecompressStream(
            &mut avail_in,
            &mut self.in_offset,
            self.input,
            &mut avail_out,
            &mut out_offset,
            buf,
            &mut self.total_out,
            &mut self.state,
        );
        (out_offset, result)
    }
}

impl<'a> Default for BrotliDecompressor<'a> {
    fn default() -> Self {
        BrotliDecompressor::new()
    }
}

fn new_decoder_state() -> BrotliState<StandardAlloc, StandardAlloc, StandardAlloc> {
    BrotliState::new(
        StandardAlloc::default(),
        StandardAlloc::default(),
        StandardAlloc::default(),
    )
}

impl<'a> Decompressor<'a> for BrotliDecompressor<'a> {
    fn set_input_data(&mut self, input: &'a [u8]) -> Result<()> {
        self.state = new_decoder_state();
        self.input = input;
        self.in_offset = 0;
        self.total_out = 0;
        self.finished = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.finished {
                error!("brotli stream ended {} bytes short", buf.len() - filled);
                return Err(Error::codec("brotli stream ended before the requested data"));
            }
            let (produced, result) = self.step(&mut buf[filled..]);
            filled += produced;
            match result {
                BrotliResult::ResultSuccess => self.finished = true,
                BrotliResult::NeedsMoreOutput => (),
                BrotliResult::NeedsMoreInput => {
                    if filled < buf.len() {
                        error!("truncated brotli stream, {} bytes missing", buf.len() - filled);
                        return Err(Error::codec("truncated brotli stream"));
                    }
                }
                BrotliResult::ResultFailure => {
                    error!("corrupted brotli stream at input offset {}", self.in_offset);
                    return Err(Error::codec("corrupted brotli stream"));
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.finished {
            if self.input.is_empty() {
                return Ok(());
            }
            let mut probe = [0; 1];
            let (produced, result) = self.step(&mut probe[..]);
            if produced > 0 {
                error!("brotli stream holds more data than was read");
                return Err(Error::codec("unread data in brotli stream"));
            }
            match result {
                BrotliResult::ResultSuccess => self.finished = true,
                BrotliResult::ResultFailure => {
                    return Err(Error::codec("corrupted brotli stream"));
                }
                _ => return Err(Error::codec("brotli stream is not terminated")),
            }
        }
        let remaining = self.input.len() - self.in_offset;
        if remaining > 0 {
            error!("{} bytes left after the brotli stream", remaining);
            return Err(Error::codec("trailing bytes after brotli stream"));
        }
        Ok(())
    }
}
