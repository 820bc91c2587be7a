//! Extractor/Packer: applies a parsed tar stream to a
//! [`VirtualFs`], and packs a `VirtualFs` subtree or content map back
//! into a gzipped tarball.

mod extract;
mod pack;
mod vfs;

pub use extract::{ExtractInput, extract};
pub use pack::{pack_contents, pack_vfs};
pub use vfs::{FileStat, MemoryFs, VirtualFs};
