/*!
Writers and readers of bsdiff patch containers.

Three container formats are supported:

* `BSDIFF40`, the legacy bsdiff 4.x format: three bzip2 streams;
* `BSDF2`, the same layout with a codec byte per stream (bzip2 or Brotli);
* `ENDSLEY/BSDIFF43`, a single interleaved stream of records, optionally
  compressed as a whole.

A diff algorithm drives a [`PatchWriter`](writer/trait.PatchWriter.html),
a patch applier drives a [`PatchReader`](reader/trait.PatchReader.html).
The diff and patch algorithms themselves are not part of this crate.
*/

#![forbid(unsafe_code)]

pub mod compress;
pub mod config;
pub mod error;
pub mod format;
pub mod reader;
pub mod repack;
pub mod utils;
pub mod writer;

pub use compress::{create_compressor, create_decompressor, Compressor, Decompressor};
pub use config::PatchConfig;
pub use error::{Error, Result};
pub use format::{detect_format, parse_compressor_types, BsdiffFormat, CompressorType};
pub use reader::{open_patch, BsdiffPatchReader, EndsleyPatchReader, PatchReader};
pub use repack::repack;
pub use utils::ControlEntry;
pub use writer::{BsdiffPatchWriter, EndsleyPatchWriter, PatchWriter, SplitPatchWriter};
