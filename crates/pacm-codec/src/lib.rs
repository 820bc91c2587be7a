pub mod gzip;
pub mod integrity;
pub mod tar;

pub use gzip::{compress as gzip_compress, decompress as gzip_decompress, is_gzip};
pub use integrity::{Algorithm, SriComponent, calculate as integrity_calculate, verify as integrity_verify};
pub use tar::{EntryType, ExtractOptions, PackEntry, TarEntry, extract as tar_extract, pack as tar_pack};

use pacm_error::NpmError;

/// Unpack a `.tgz` package tarball in one call: gunzip, then extract.
pub fn unpack_tarball(gzipped: &[u8], options: ExtractOptions) -> Result<Vec<TarEntry>, NpmError> {
    let raw = gzip::decompress(gzipped)?;
    tar::extract(&raw, options)
}

/// Pack entries into a `.tgz` tarball in one call: tar, then gzip.
pub fn pack_tarball(entries: &[PackEntry]) -> Result<Vec<u8>, NpmError> {
    let raw = tar::pack(entries)?;
    gzip::compress(&raw)
}
