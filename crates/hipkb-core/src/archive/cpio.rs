//! CPIO "newc" (SVR4) decoder for HIP containers.
//!
//! A HIP file is a gzip-wrapped newc archive, sometimes carrying a 4-byte
//! proprietary prefix before the first header. Headers are 110 bytes of
//! ASCII hex; header+name and payload are each padded to 4-byte boundaries;
//! a member named `TRAILER!!!` ends the stream.

use crate::error::ArchiveFormatError;
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

const NEWC_MAGIC: &[u8] = b"070701";
const HEADER_LEN: usize = 110;
const TRAILER_NAME: &str = "TRAILER!!!";
/// How far into the buffer we hunt for a displaced magic before giving up.
const MAGIC_SCAN_WINDOW: usize = 256;

/// One member of the archive. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Member path as stored in the archive.
    pub name: String,
    /// Mode bits from the header.
    pub mode: u32,
    /// Declared payload size.
    pub size: u32,
    /// Payload bytes.
    pub data: Vec<u8>,
}

/// Decode an archive buffer into its members, in file order.
///
/// Truncated archives yield the decoded prefix silently; garbage between
/// entries is skipped by resynchronizing on the next magic. Only a missing
/// magic at the head or corrupt header hex abort decoding.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveFormatError> {
    let decompressed = maybe_gunzip(bytes)?;
    let body = skip_container_prefix(&decompressed)?;
    decode_entries(body)
}

/// Transparently decompress if a gzip magic sits at offset 0, or at offset 4
/// behind the proprietary prefix.
fn maybe_gunzip(bytes: &[u8]) -> Result<Cow<'_, [u8]>, ArchiveFormatError> {
    let stream = if starts_with_gzip(bytes) {
        bytes
    } else if bytes.len() > 4 && starts_with_gzip(&bytes[4..]) {
        debug!("discarding 4-byte prefix before gzip stream");
        &bytes[4..]
    } else {
        return Ok(Cow::Borrowed(bytes));
    };

    let mut decoder = GzDecoder::new(stream);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ArchiveFormatError::Gzip {
            message: e.to_string(),
        })?;
    Ok(Cow::Owned(out))
}

fn starts_with_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B
}

/// Locate the first newc header, discarding Houdini's compressed-content
/// prefix when present.
fn skip_container_prefix(bytes: &[u8]) -> Result<&[u8], ArchiveFormatError> {
    if bytes.len() >= NEWC_MAGIC.len() && bytes.starts_with(NEWC_MAGIC) {
        return Ok(bytes);
    }
    if bytes.len() >= 4 + NEWC_MAGIC.len() && bytes[4..].starts_with(NEWC_MAGIC) {
        debug!("discarding 4-byte container prefix");
        return Ok(&bytes[4..]);
    }
    let scan_end = bytes
        .len()
        .saturating_sub(NEWC_MAGIC.len() - 1)
        .min(MAGIC_SCAN_WINDOW);
    for i in 0..scan_end {
        if bytes[i..].starts_with(NEWC_MAGIC) {
            debug!(offset = i, "discarding bytes before displaced magic");
            return Ok(&bytes[i..]);
        }
    }
    Err(ArchiveFormatError::NoMagic)
}

fn decode_entries(buf: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveFormatError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    loop {
        if offset + HEADER_LEN > buf.len() {
            if offset < buf.len() {
                debug!(offset, "archive truncated inside a header");
            }
            break;
        }

        if !buf[offset..].starts_with(NEWC_MAGIC) {
            // Garbage between entries: hunt for the next magic.
            match find_magic(buf, offset + 1) {
                Some(next) => {
                    debug!(from = offset, to = next, "resynchronized on next magic");
                    offset = next;
                    continue;
                }
                None => break,
            }
        }

        let mode = hex_field(buf, offset, 1)?;
        let filesize = hex_field(buf, offset, 6)?;
        let namesize = hex_field(buf, offset, 11)? as usize;

        let name_start = offset + HEADER_LEN;
        let name_end = name_start + namesize;
        if name_end > buf.len() {
            debug!(offset, "archive truncated inside a file name");
            break;
        }
        // namesize counts the terminating NUL.
        let name_bytes = &buf[name_start..name_end];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        if name == TRAILER_NAME {
            break;
        }

        // Padding is relative to the entry start, so entries reached through
        // resynchronization at an unaligned offset still decode correctly.
        let head_span = align4(HEADER_LEN + namesize);
        let data_start = offset + head_span;
        let data_end = data_start + filesize as usize;
        if data_end > buf.len() {
            debug!(offset, name = %name, "archive truncated inside a payload");
            break;
        }

        entries.push(ArchiveEntry {
            name,
            mode,
            size: filesize,
            data: buf[data_start..data_end].to_vec(),
        });

        offset = offset + head_span + align4(filesize as usize);
    }

    Ok(entries)
}

/// Parse one 8-byte ASCII-hex header field. Field 0 is `ino`; the retained
/// fields are mode (1), filesize (6), and namesize (11).
fn hex_field(buf: &[u8], header_offset: usize, field: usize) -> Result<u32, ArchiveFormatError> {
    let start = header_offset + NEWC_MAGIC.len() + field * 8;
    let raw = &buf[start..start + 8];
    let text = std::str::from_utf8(raw).map_err(|_| ArchiveFormatError::BadHeader {
        offset: header_offset,
    })?;
    u32::from_str_radix(text.trim(), 16).map_err(|_| ArchiveFormatError::BadHeader {
        offset: header_offset,
    })
}

fn find_magic(buf: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(NEWC_MAGIC.len())
        .position(|w| w == NEWC_MAGIC)
        .map(|p| from + p)
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn pad4(out: &mut Vec<u8>) {
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    /// Assemble one newc member: header, NUL-terminated name, payload.
    pub(crate) fn newc_member(name: &str, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(NEWC_MAGIC);
        let fields: [u32; 13] = [
            1,                        // ino
            0o100644,                 // mode
            0,                        // uid
            0,                        // gid
            1,                        // nlink
            0,                        // mtime
            data.len() as u32,        // filesize
            0,                        // devmajor
            0,                        // devminor
            0,                        // rdevmajor
            0,                        // rdevminor
            (name.len() + 1) as u32,  // namesize
            0,                        // check
        ];
        for value in fields {
            out.extend_from_slice(format!("{value:08X}").as_bytes());
        }
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        pad4(&mut out);
        out.extend_from_slice(data);
        pad4(&mut out);
        out
    }

    pub(crate) fn newc_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, data) in members {
            out.extend_from_slice(&newc_member(name, data));
        }
        out.extend_from_slice(&newc_member(TRAILER_NAME, b""));
        out
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_round_trip_preserves_entries() {
        let archive = newc_archive(&[
            ("obj/geo1/box1", b"type = box\n"),
            ("obj/geo1/xform1", b"type = xform\n"),
        ]);
        let entries = read_archive(&archive).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "obj/geo1/box1");
        assert_eq!(entries[0].data, b"type = box\n");
        assert_eq!(entries[1].name, "obj/geo1/xform1");
        assert_eq!(entries[1].size as usize, entries[1].data.len());
    }

    #[test]
    fn test_gzip_wrapper_is_transparent() {
        let archive = newc_archive(&[("a", b"hello")]);
        let entries = read_archive(&gzip(&archive)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data, b"hello");
    }

    #[test]
    fn test_four_byte_prefix_is_skipped() {
        let mut bytes = vec![0x01, 0x02, 0x03, 0x04];
        bytes.extend_from_slice(&newc_archive(&[("a", b"x")]));
        let entries = read_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_displaced_magic_within_scan_window() {
        let mut bytes = vec![0xAA; 37];
        bytes.extend_from_slice(&newc_archive(&[("a", b"x")]));
        let entries = read_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_magic_is_an_error() {
        let bytes = vec![0u8; 600];
        match read_archive(&bytes) {
            Err(ArchiveFormatError::NoMagic) => {}
            other => panic!("expected NoMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_header_hex_aborts() {
        let mut archive = newc_archive(&[("a", b"x")]);
        // Clobber the filesize field of the first header with non-hex bytes.
        let filesize_start = NEWC_MAGIC.len() + 6 * 8;
        archive[filesize_start..filesize_start + 8].copy_from_slice(b"ZZZZZZZZ");
        match read_archive(&archive) {
            Err(ArchiveFormatError::BadHeader { offset: 0 }) => {}
            other => panic!("expected BadHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_resync_skips_inter_entry_garbage() {
        let mut bytes = newc_member("a", b"first");
        bytes.extend_from_slice(b"!!!garbage!!!");
        bytes.extend_from_slice(&newc_member("b", b"second"));
        bytes.extend_from_slice(&newc_member(TRAILER_NAME, b""));
        let entries = read_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].data, b"second");
    }

    #[test]
    fn test_truncated_payload_returns_prefix() {
        let mut bytes = newc_member("a", b"first");
        bytes.extend_from_slice(&newc_member("b", b"this payload gets cut"));
        bytes.truncate(bytes.len() - 10);
        let entries = read_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
    }

    #[test]
    fn test_trailer_only_archive_is_empty() {
        let archive = newc_archive(&[]);
        let entries = read_archive(&archive).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_prefix_before_gzip_stream() {
        // Real HIP files carry the prefix outside the compressed stream.
        let mut bytes = vec![0x01, 0x02, 0x03, 0x04];
        bytes.extend_from_slice(&gzip(&newc_archive(&[])));
        let entries = read_archive(&bytes).unwrap();
        assert!(entries.is_empty());
    }
}
