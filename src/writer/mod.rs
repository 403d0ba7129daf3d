/*!
Patch writers.

A diff producer calls `init` with the size of the new file, then any
interleaving of `add_control_entry`, `write_diff_stream` and
`write_extra_stream`, then `close`. Writers serialize the streams in logical
control entry order whatever the order of the calls was.
*/

mod bsdiff;
mod endsley;
mod split;

pub use self::bsdiff::BsdiffPatchWriter;
pub use self::endsley::EndsleyPatchWriter;
pub use self::split::SplitPatchWriter;

use crate::error::Result;
use crate::utils::ControlEntry;

/// Sink of a diff producer.
pub trait PatchWriter {
    /// Declares the size of the new file and starts the patch.
    fn init(&mut self, new_size: u64) -> Result<()>;

    /// Appends bytes to the diff stream.
    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()>;

    /// Appends bytes to the extra stream.
    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()>;

    /// Appends a control entry.
    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()>;

    /// Finalizes the patch. Fails if the supplied data does not match the
    /// declared control entries.
    fn close(&mut self) -> Result<()>;
}

impl<P: PatchWriter + ?Sized> PatchWriter for Box<P> {
    fn init(&mut self, new_size: u64) -> Result<()> {
        (**self).init(new_size)
    }

    fn write_diff_stream(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_diff_stream(data)
    }

    fn write_extra_stream(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_extra_stream(data)
    }

    fn add_control_entry(&mut self, entry: ControlEntry) -> Result<()> {
        (**self).add_control_entry(entry)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
