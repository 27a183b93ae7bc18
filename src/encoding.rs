//! Byte decoding for raw chart sources.
//!
//! The engine itself only consumes `&str`; whoever reads files hands the
//! raw bytes through one of these helpers first. Decoding never fails:
//! malformed sequences are replaced, matching the tolerant behavior
//! expected of community chart archives. Row-grid charts are UTF-8,
//! channel/value charts are conventionally Shift_JIS.

use encoding_rs::{SHIFT_JIS, UTF_8};

/// Decodes row-grid chart bytes as UTF-8, replacing invalid sequences.
#[must_use]
pub fn decode_utf8(bytes: &[u8]) -> String {
    let (text, _, _) = UTF_8.decode(bytes);
    text.into_owned()
}

/// Decodes channel/value chart bytes as Shift_JIS, replacing invalid
/// sequences.
#[must_use]
pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let (text, _, _) = SHIFT_JIS.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn utf8_passthrough() {
        assert_eq!(decode_utf8("#TITLE:Song;".as_bytes()), "#TITLE:Song;");
    }

    #[test]
    fn utf8_replaces_invalid_bytes() {
        let decoded = decode_utf8(b"#TITLE:S\xffng;");
        assert!(decoded.contains('\u{FFFD}'));
        assert!(decoded.starts_with("#TITLE:S"));
    }

    #[test]
    fn shift_jis_title() {
        // "テスト" in Shift_JIS.
        let bytes = b"#TITLE \x83\x65\x83\x58\x83\x67";
        assert_eq!(decode_shift_jis(bytes), "#TITLE テスト");
    }
}
