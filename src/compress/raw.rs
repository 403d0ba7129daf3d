use super::Decompressor;
use crate::error::{Error, Result};
use log::error;

/// Pass-through decompressor for uncompressed streams.
#[derive(Default)]
pub struct RawDecompressor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> RawDecompressor<'a> {
    pub fn new() -> Self {
        RawDecompressor { input: &[], pos: 0 }
    }
}

impl<'a> Decompressor<'a> for RawDecompressor<'a> {
    fn set_input_data(&mut self, input: &'a [u8]) -> Result<()> {
        self.input = input;
        self.pos = 0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let remaining = self.input.len() - self.pos;
        if buf.len() > remaining {
            error!("requested {} bytes, only {} left", buf.len(), remaining);
            return Err(Error::codec("truncated uncompressed stream"));
        }
        buf.copy_from_slice(&self.input[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.pos != self.input.len() {
            error!("{} bytes left in uncompressed stream", self.input.len() - self.pos);
            return Err(Error::codec("trailing bytes in uncompressed stream"));
        }
        Ok(())
    }
}
