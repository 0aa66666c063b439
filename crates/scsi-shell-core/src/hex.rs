//! Hex text <-> byte buffer conversion for raw SCSI payloads.

use std::fmt::Write;

/// Bytes per row in [`hex_dump`] output.
pub const DUMP_ROW_LEN: usize = 16;

/// Decode hexadecimal digit pairs out of free-form text.
///
/// Characters that are not hex digits are skipped one at a time. Once a hex
/// digit is found its partner must be the very next character; if it is not,
/// decoding stops and the bytes decoded so far are returned. Decoding also
/// stops silently once `max_len` bytes have been produced.
///
/// An empty result means the input carried no usable data. Callers must treat
/// it as invalid input, not as a zero-length transfer.
pub fn decode(text: &str, max_len: usize) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(max_len.min(bytes.len() / 2));
    let mut i = 0;

    while i < bytes.len() && out.len() < max_len {
        let Some(high) = nibble(bytes[i]) else {
            i += 1;
            continue;
        };
        let Some(low) = bytes.get(i + 1).copied().and_then(nibble) else {
            break;
        };
        out.push((high << 4) | low);
        i += 2;
    }

    out
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Render bytes as upper-case hex, [`DUMP_ROW_LEN`] per line.
///
/// Every byte is followed by a space. The result always ends with a newline
/// unless `data` is empty.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / DUMP_ROW_LEN + 1);
    for (i, b) in data.iter().enumerate() {
        let _ = write!(out, "{:02X} ", b);
        if (i + 1) % DUMP_ROW_LEN == 0 {
            out.push('\n');
        }
    }
    if data.len() % DUMP_ROW_LEN != 0 {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty() {
        assert!(decode("", 8192).is_empty());
    }

    #[test]
    fn test_decode_spaced_pairs() {
        assert_eq!(decode("41 42", 8192), vec![0x41, 0x42]);
    }

    #[test]
    fn test_decode_trailing_odd_digit() {
        assert!(decode("4", 8192).is_empty());
        assert_eq!(decode("41424", 8192), vec![0x41, 0x42]);
    }

    #[test]
    fn test_decode_skips_non_hex() {
        assert_eq!(decode("zz4142", 8192), vec![0x41, 0x42]);
        assert_eq!(decode("12,34", 8192), vec![0x12, 0x34]);
        // '0' pairs with 'x', which is not a digit
        assert!(decode("0x12,0x34", 8192).is_empty());
    }

    #[test]
    fn test_decode_split_pair_stops() {
        // '4' followed by a space is an unpaired digit
        assert!(decode("4 1", 8192).is_empty());
        assert_eq!(decode("ab 4 1", 8192), vec![0xAB]);
    }

    #[test]
    fn test_decode_mixed_case() {
        assert_eq!(decode("aBcD", 8192), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_decode_respects_cap() {
        assert_eq!(decode("0102030405", 3), vec![1, 2, 3]);
        assert!(decode("0102", 0).is_empty());
    }

    #[test]
    fn test_decode_fully_invalid() {
        assert!(decode("xyz!? ", 8192).is_empty());
    }

    #[test]
    fn test_hex_dump_rows() {
        let data: Vec<u8> = (0..18).collect();
        let dump = hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00 01 02"));
        assert_eq!(lines[1], "10 11 ");
    }

    #[test]
    fn test_hex_dump_exact_row() {
        let dump = hex_dump(&[0xFF; 16]);
        assert!(dump.ends_with("FF \n"));
        assert_eq!(dump.matches('\n').count(), 1);
        assert_eq!(hex_dump(&[]), "");
    }
}
