use super::PatchWriter;
use crate::error::{Error, Result};
use crate::utils::ControlEntry;
use log::{debug, error};

/// Splits one patch into several patches, each producing a fixed size chunk
/// of the new file.
///
/// Every sub-patch is applied against the whole old file, so a sub-patch
/// starts by seeking to the old file position reached by the previous one.
/// Diff and extra data are routed by the declared sizes: a control entry must
/// be added before its data.
pub struct SplitPatchWriter<'w> {
    new_chunk_size: u64,
    patches: Vec<Box<dyn PatchWriter + 'w>>,
    new_size: u64,

    current: usize,
    initialized: bool,
    /// New file bytes declared so far.
    written_output: u64,
    /// Absolute position in the old file after the declared entries.
    old_pos: i64,
    /// Seek owed by the current sub-patch to reach `old_pos`.
    pending_seek: i64,

    /// Diff and extra bytes each sub-patch still expects.
    diff_sizes: Vec<u64>,
    extra_sizes: Vec<u64>,
    diff_patch: usize,
    extra_patch: usize,
}

impl<'w> SplitPatchWriter<'w> {
    /// Creates a writer over the sub-patch writers, in new file order.
    pub fn new(new_chunk_size: u64, patches: Vec<Box<dyn PatchWriter + 'w>>) -> Result<Self> {
        if new_chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must not be zero"));
        }
        let n = patches.len();
        Ok(SplitPatchWriter {
            new_chunk_size,
            patches,
            new_size: 0,
            current: 0,
            initialized: false,
            written_output: 0,
            old_pos: 0,
            pending_seek: 0,
            diff_sizes: vec![0; n],
            extra_sizes: vec![0; n],
            diff_patch: 0,
            extra_patch: 0,
        })
    }

    /// Count of sub-patches needed for a new file of `new_size` bytes.
    pub fn expected_patches(new_size: u64, new_chunk_size: u64) -> u64 {
        let n = new_size / new_chunk_size + u64::from(new_size % new_chunk_size != 0);
        Ord::max(n, 1)
    }

    /// Unwraps the sub-patch writers.
    pub fn into_inner(self) -> Vec<Box<dyn PatchWriter + 'w>> {
        self.patches
    }

    /// End of the current chunk in the new file.
    fn boundary(&self) -> u64 {
        let end = (self.current as u64 + 1).saturating_mul(self.new_chunk_size);
        Ord::min(end, self.new_size)
    }

    /// Moves on to the next sub-patch.
    fn next_patch(&mut self) -> Result<()> {
        self.current += 1;
        let start = self.current as u64 * self.new_chunk_size;
        let size = Ord::min(self.new_size - start, self.new_chunk_size);
        debug!("starting patch {} at new offset {}", self.current, start);
        self.patches[self.current].init(size)?;
        self.pending_seek = self.old_pos;
        Ok(())
    }

    /// Adds an entry contained in the current sub-patch.
    fn add_to_current(&mut self, mut entry: ControlEntry) -> Result<()> {
        if self.pending_seek != 0 {
            if entry.diff_size == 0 {
                // Extra data does not read the old file, the seek can wait.
                entry.offset_increment = add_offset(entry.offset_increment, self.pending_seek)?;
            } else {
                let seek = ControlEntry::new(0, 0, self.pending_seek);
                self.patches[self.current].add_control_entry(seek)?;
            }
            self.pending_seek = 0;
        }
        self.diff_sizes[self.current] += entry.diff_size;
        self.extra_sizes[self.current] += entry.extra_size;
        self.patches[self.current].add_control_entry(entry)
    }
}

fn add_offset(x: i64, y: i64) -> Result<i64> {
    x.checked_add(y)
        .ok_or_else(|| Error::sequence("old file position overflows"))
}

/// Routes stream data to the sub-patches expecting it.
fn route<'w, F>(
    patches: &mut [Box<dyn PatchWriter + 'w>],
    sizes: &mut [u64],
    index: &mut usize,
    last: usize,
    mut data: &[u8],
    mut write: F,
) -> Result<()>
where
    F: FnMut(&mut dyn PatchWriter, &[u8]) -> Result<()>,
{
    while !data.is_empty() {
        while *index < last && sizes[*index] == 0 {
            *index += 1;
        }
        let owed = sizes[*index];
        if owed == 0 {
            error!("{} bytes written without a control entry", data.len());
            return Err(Error::sequence("stream data written before its control entry"));
        }
        let n = Ord::min(owed, data.len() as u64) as usize;
        write(&mut *patches[*index], &data[..n])?;
        sizes[*index] -= n as u64;
        data = &data[n..];
    }
    Ok(())
}

impl<'w> PatchWriter for SplitPatchWriter<'w> {
    fn init(&mut self, new_size: u64) -> Result<()> {
        if self.initialized {
            return Err(Error::sequence("patch writer initialized twice"));
        }
        let expected = Self::expected_patches(new_size, self.new_chunk_size);
        if expected != self.patches.len() as u64 {
            error!(
                "expected {} patches for a new file of {} bytes split in chunks of {}, got {}",
                expected,
                new_size,
                self.new_chunk_size,
                self.patches.len()
            );
            return Err(Error::invalid_config("wrong number of patches"));
        }
        self.new_size = new_size;
        self.patches[0].init(Ord::min(new_size, self.new_chunk_size))?;
        self.initialized = true;
        Ok(())
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()> {
        if !self.initialized {
            return Err(Error::sequence("patch writer is not initialized"));
        }
        route(
            &mut self.patches[..],
            &mut self.diff_sizes[..],
            &mut self.diff_patch,
            self.current,
            data,
            |p, d| p.write_diff_stream(d),
        )
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()> {
        if !self.initialized {
            return Err(Error::sequence("patch writer is not initialized"));
        }
        route(
            &mut self.patches[..],
            &mut self.extra_sizes[..],
            &mut self.extra_patch,
            self.current,
            data,
            |p, d| p.write_extra_stream(d),
        )
    }

    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()> {
        if !self.initialized {
            return Err(Error::sequence("patch writer is not initialized"));
        }
        let mut rest = entry;
        loop {
            let last = self.current + 1 == self.patches.len();
            if !last && self.written_output >= self.boundary() {
                self.next_patch()?;
                continue;
            }

            let total = rest.output_size();
            let room = self.boundary().saturating_sub(self.written_output);
            if total <= room {
                self.add_to_current(rest)?;
                self.written_output += total;
                self.old_pos = add_offset(self.old_pos, rest.diff_size as i64)?;
                self.old_pos = add_offset(self.old_pos, rest.offset_increment)?;
                return Ok(());
            }
            if last {
                error!(
                    "entry of {} bytes overruns the new size {}",
                    total, self.new_size
                );
                return Err(Error::sequence("control entries exceed the declared new size"));
            }

            // The entry crosses the chunk boundary; the seek goes with its
            // last part.
            let diff = Ord::min(rest.diff_size, room);
            let extra = Ord::min(rest.extra_size, room - diff);
            self.add_to_current(ControlEntry::new(diff, extra, 0))?;
            self.written_output += diff + extra;
            self.old_pos = add_offset(self.old_pos, diff as i64)?;
            rest.diff_size -= diff;
            rest.extra_size -= extra;
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::sequence("patch writer is not initialized"));
        }
        if self.current + 1 != self.patches.len() {
            error!(
                "only {} of {} patches were written",
                self.current + 1,
                self.patches.len()
            );
            return Err(Error::sequence("not all patches were written"));
        }
        if self.diff_sizes.iter().chain(self.extra_sizes.iter()).any(|&n| n != 0) {
            return Err(Error::sequence("not all declared diff/extra data was written"));
        }
        for patch in self.patches.iter_mut() {
            patch.close()?;
        }
        Ok(())
    }
}
