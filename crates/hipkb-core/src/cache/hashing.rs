//! Streaming SHA-256 helpers.
//!
//! Archive identity throughout the store is the lowercase-hex SHA-256 of the
//! full file bytes.

use crate::error::{HipError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Chunk size for streaming file reads.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// SHA-256 of an in-memory buffer, as lowercase hex.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's contents, as lowercase hex.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| HipError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| HipError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file's SHA-256 against an expected lowercase-hex digest.
pub fn verify_sha256(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    let expected_lower = expected.to_lowercase();
    if actual == expected_lower {
        Ok(())
    } else {
        Err(HipError::HashMismatch {
            expected: expected_lower,
            actual,
        })
    }
}
