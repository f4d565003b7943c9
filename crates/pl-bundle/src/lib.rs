//! Fragment archiving for partload.
//!
//! A fragment directory produced by the external builder is packed into a
//! single ZIP container before it is shipped to the remote filesystem:
//!
//! ```text
//! <prefix>__<fragment>.zip
//! ├── checksums.txt
//! ├── columns.txt
//! ├── count.txt
//! ├── data.bin
//! └── ...
//! ```
//!
//! Only regular files directly inside the fragment are archived; each entry
//! is named by its base file name.

pub mod archive;
pub mod error;

pub use archive::{ArchiveStats, Compression, FragmentArchiver, MAX_ENTRY_SIZE};
pub use error::{BundleError, Result};
