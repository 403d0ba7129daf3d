use super::PatchWriter;
use crate::compress::{create_compressor, Compressor};
use crate::error::{Error, Result};
use crate::format::*;
use crate::utils::*;
use log::{debug, error, trace};
use std::collections::VecDeque;
use std::io::Write;

/// Buffered control data needed before a flush is attempted.
pub const MIN_FLUSH_SIZE: u64 = 1024 * 1024;

/// Writer of the interleaved `ENDSLEY/BSDIFF43` format.
///
/// The patch is a 24 bytes header followed by records, each made of a control
/// entry, its diff bytes and its extra bytes. Everything after the header goes
/// through one optional compressor.
///
/// The three streams may be supplied in any order: data that cannot be
/// emitted yet is buffered and written out once the entries before it are
/// complete.
pub struct EndsleyPatchWriter<W: Write> {
    sink: W,
    kind: CompressorType,
    quality: u32,
    compressor: Option<Box<dyn Compressor>>,

    /// Diff bytes still owed by the last emitted control entry.
    pending_diff: u64,
    /// Extra bytes still owed by the last emitted control entry.
    pending_extra: u64,
    /// Diff and extra bytes declared by the buffered control entries.
    pending_control_data: u64,

    diff_data: Vec<u8>,
    extra_data: Vec<u8>,
    control: VecDeque<ControlEntry>,

    initialized: bool,
    closed: bool,
}

impl<W: Write> EndsleyPatchWriter<W> {
    /// Creates a writer, `NoCompression` writes the records as is.
    pub fn new(sink: W, kind: CompressorType, brotli_quality: u32) -> Self {
        EndsleyPatchWriter {
            sink,
            kind,
            quality: brotli_quality,
            compressor: None,
            pending_diff: 0,
            pending_extra: 0,
            pending_control_data: 0,
            diff_data: Vec::new(),
            extra_data: Vec::new(),
            control: VecDeque::new(),
            initialized: false,
            closed: false,
        }
    }

    pub fn compressor_type(&self) -> CompressorType {
        self.kind
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn check_writable(&self) -> Result<()> {
        if !self.initialized {
            Err(Error::sequence("patch writer is not initialized"))
        } else if self.closed {
            Err(Error::sequence("patch writer is closed"))
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match self.compressor {
            Some(ref mut c) => c.write(data),
            None => Ok(self.sink.write_all(data)?),
        }
    }

    fn emit_control_entry(&mut self, entry: &ControlEntry) -> Result<()> {
        let b = entry.encode()?;
        self.emit(&b[..])
    }

    /// Emits every buffered piece of data that is now in order.
    fn flush(&mut self) -> Result<()> {
        let mut used_diff = 0;
        let mut used_extra = 0;
        loop {
            if self.pending_diff == 0 && self.pending_extra == 0 {
                match self.control.pop_front() {
                    Some(entry) => {
                        self.pending_diff = entry.diff_size;
                        self.pending_extra = entry.extra_size;
                        self.pending_control_data -= entry.output_size();
                        self.emit_control_entry(&entry)?;
                    }
                    None => break,
                }
            }

            let n = Ord::min((self.diff_data.len() - used_diff) as u64, self.pending_diff) as usize;
            if n > 0 {
                let data = std::mem::take(&mut self.diff_data);
                let result = self.emit(&data[used_diff..used_diff + n]);
                self.diff_data = data;
                result?;
                used_diff += n;
                self.pending_diff -= n as u64;
            }

            if self.pending_diff == 0 {
                let n = Ord::min((self.extra_data.len() - used_extra) as u64, self.pending_extra)
                    as usize;
                if n > 0 {
                    let data = std::mem::take(&mut self.extra_data);
                    let result = self.emit(&data[used_extra..used_extra + n]);
                    self.extra_data = data;
                    result?;
                    used_extra += n;
                    self.pending_extra -= n as u64;
                }
            }

            if self.pending_diff != 0 || self.pending_extra != 0 {
                break;
            }
        }

        trace!(
            "flushed {} diff and {} extra bytes, {} entries left",
            used_diff,
            used_extra,
            self.control.len()
        );
        self.diff_data.drain(..used_diff);
        self.extra_data.drain(..used_extra);
        Ok(())
    }
}

impl<W: Write> PatchWriter for EndsleyPatchWriter<W> {
    fn init(&mut self, new_size: u64) -> Result<()> {
        if self.initialized {
            return Err(Error::sequence("patch writer initialized twice"));
        }
        if new_size > i64::MAX as u64 {
            return Err(Error::sequence(format!("new size {} is out of range", new_size)));
        }
        self.compressor = create_compressor(self.kind, self.quality);

        let mut header = [0; ENDSLEY_HEADER_SIZE];
        header[0..16].copy_from_slice(ENDSLEY_MAGIC);
        encode_int(new_size as i64, &mut header[16..24]);
        self.sink.write_all(&header[..])?;
        self.initialized = true;
        Ok(())
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        if data.is_empty() {
            return Ok(());
        }
        // Data following the entry that needs it goes straight out.
        if self.control.is_empty()
            && self.diff_data.is_empty()
            && self.pending_diff >= data.len() as u64
        {
            self.pending_diff -= data.len() as u64;
            return self.emit(data);
        }
        self.diff_data.extend_from_slice(data);
        Ok(())
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        if data.is_empty() {
            return Ok(());
        }
        if self.control.is_empty()
            && self.extra_data.is_empty()
            && self.pending_diff == 0
            && self.pending_extra >= data.len() as u64
        {
            self.pending_extra -= data.len() as u64;
            return self.emit(data);
        }
        self.extra_data.extend_from_slice(data);
        Ok(())
    }

    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()> {
        self.check_writable()?;
        entry.encode()?;
        if self.control.is_empty() && self.pending_diff == 0 && self.pending_extra == 0 {
            self.pending_diff = entry.diff_size;
            self.pending_extra = entry.extra_size;
            return self.emit_control_entry(&entry);
        }

        self.control.push_back(entry);
        self.pending_control_data = self
            .pending_control_data
            .checked_add(entry.output_size())
            .ok_or_else(|| Error::sequence("declared output size overflows"))?;

        // Flush only once enough control data is buffered, and only if it
        // covers at least half of the buffered diff and extra data, so that
        // erasing the flushed prefixes stays cheap.
        let buffered = (self.diff_data.len() + self.extra_data.len()) as u64;
        if self.pending_control_data > MIN_FLUSH_SIZE && buffered / 2 <= self.pending_control_data {
            debug!(
                "flushing {} bytes of control data against {} buffered bytes",
                self.pending_control_data, buffered
            );
            self.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.check_writable()?;
        self.closed = true;
        self.flush()?;

        if self.pending_diff != 0 || self.pending_extra != 0 || !self.control.is_empty() {
            error!(
                "insufficient data: {} diff and {} extra bytes owed, {} entries unwritten",
                self.pending_diff,
                self.pending_extra,
                self.control.len()
            );
            return Err(Error::sequence("not all declared diff/extra data was written"));
        }
        if !self.diff_data.is_empty() || !self.extra_data.is_empty() {
            error!(
                "{} diff and {} extra bytes written without control entries",
                self.diff_data.len(),
                self.extra_data.len()
            );
            return Err(Error::sequence("diff/extra data without control entries"));
        }

        if let Some(ref mut c) = self.compressor {
            c.finish()?;
            self.sink.write_all(c.compressed_data())?;
        }
        self.sink.flush()?;
        Ok(())
    }
}
