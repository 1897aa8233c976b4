//! zlib compression envelope for analysis BLOBs
//!
//! Most analysis BLOBs are stored as a 4-byte big-endian uncompressed
//! length followed by a zlib stream. The empty BLOB is the 4-byte value
//! `00 00 00 00` with no payload.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Wrap raw bytes in the length-prefixed zlib envelope.
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + raw.len() / 2);
    out.extend_from_slice(&(raw.len() as i32).to_be_bytes());
    if raw.is_empty() {
        return Ok(out);
    }

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| Error::Backend(format!("zlib deflation failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::Backend(format!("zlib deflation failed: {e}")))
}

/// Unwrap the length-prefixed zlib envelope.
///
/// A zero-length input and a `00 00 00 00` prefix both decode to the empty
/// byte sequence. A nonzero declared length with a missing, corrupt, or
/// wrong-sized payload fails with `blob-malformed`.
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    if blob.len() < 4 {
        return Err(Error::BlobMalformed(
            "compressed data is less than the minimum size of 4 bytes".into(),
        ));
    }

    let declared = i32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]);
    if declared == 0 {
        return Ok(Vec::new());
    }
    if declared < 0 {
        return Err(Error::BlobMalformed(format!(
            "compressed data declares negative uncompressed length {declared}"
        )));
    }

    let mut raw = Vec::with_capacity(declared as usize);
    let mut decoder = ZlibDecoder::new(&blob[4..]);
    decoder.read_to_end(&mut raw).map_err(|e| {
        Error::BlobMalformed(format!("zlib inflation failed: {e}"))
    })?;

    if raw.len() != declared as usize {
        return Err(Error::BlobMalformed(format!(
            "compressed data declares {} uncompressed byte(s) but inflated to {}",
            declared,
            raw.len()
        )));
    }
    Ok(raw)
}
