//! Outer container decoding: gzip wrapper, Houdini prefix, CPIO "newc" body.

mod cpio;
mod filter;

pub use cpio::{read_archive, ArchiveEntry};
pub use filter::is_text_entry;
