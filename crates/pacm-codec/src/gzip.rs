use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use pacm_error::NpmError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Decompress a gzip-wrapped buffer. Fails `ETARBALL` on missing magic,
/// truncation, or an inflate error.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, NpmError> {
    if bytes.len() < 2 || bytes[0..2] != GZIP_MAGIC {
        return Err(NpmError::tarball("not a gzip stream: missing 1F 8B magic"));
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| NpmError::tarball(format!("gzip inflate failed: {e}")))?;
    Ok(out)
}

/// Compress a buffer with gzip at the default compression level.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, NpmError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| NpmError::tarball(format!("gzip deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| NpmError::tarball(format!("gzip deflate failed: {e}")))
}

/// Streaming decompressor: feed chunks, get decompressed bytes out.
/// Concatenating the chunks fed in must equal the output of feeding the
/// whole buffer at once to [`decompress`].
pub struct StreamDecoder {
    buffered_input: Vec<u8>,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self { buffered_input: Vec::new() }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffered_input.extend_from_slice(chunk);
    }

    /// Finish the stream and return the fully decompressed bytes.
    pub fn finish(self) -> Result<Vec<u8>, NpmError> {
        decompress(&self.buffered_input)
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Auto-detect whether `bytes` starts with the gzip magic.
#[must_use]
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0..2] == GZIP_MAGIC
}
