//! Text/binary classification of archive members.
//!
//! Node stanzas are plain ASCII; geometry and texture payloads are not.
//! Classification scans only a short prefix so multi-megabyte blobs are
//! rejected cheaply.

use super::ArchiveEntry;

/// Bytes inspected when classifying an entry.
const SCAN_PREFIX: usize = 512;

/// Whether an entry looks like parseable text.
///
/// True iff the declared size is non-zero and every byte of the first
/// `min(512, size)` payload bytes is a tab, newline, carriage return, or
/// printable ASCII. A leading NUL always classifies as binary.
pub fn is_text_entry(entry: &ArchiveEntry) -> bool {
    if entry.size == 0 || entry.data.is_empty() {
        return false;
    }
    let prefix = &entry.data[..entry.data.len().min(SCAN_PREFIX)];
    prefix
        .iter()
        .all(|&b| matches!(b, 0x09 | 0x0A | 0x0D | 0x20..=0x7E))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(data: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: "obj/geo1/test".into(),
            mode: 0o100644,
            size: data.len() as u32,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_plain_stanza_is_text() {
        assert!(is_text_entry(&entry(b"type = box\nname = box1\n")));
    }

    #[test]
    fn test_tabs_and_crlf_are_text() {
        assert!(is_text_entry(&entry(b"parm\t{\r\n\tname\tscale\r\n}\r\n")));
    }

    #[test]
    fn test_empty_entry_is_not_text() {
        assert!(!is_text_entry(&entry(b"")));
    }

    #[test]
    fn test_leading_nul_is_binary_regardless_of_remainder() {
        let mut data = vec![0u8];
        data.extend_from_slice(&[b'a'; 1000]);
        assert!(!is_text_entry(&entry(&data)));
    }

    #[test]
    fn test_binary_past_scan_prefix_is_ignored() {
        let mut data = vec![b'x'; SCAN_PREFIX];
        data.extend_from_slice(&[0u8; 16]);
        assert!(is_text_entry(&entry(&data)));
    }

    #[test]
    fn test_high_bytes_are_binary() {
        assert!(!is_text_entry(&entry(&[b'a', 0xC3, 0xA9])));
    }
}
