//! Encoding utilities for moving legacy Chinese text to UTF-8.
//!
//! Uses encoding_rs for every codec so label handling follows the WHATWG
//! Encoding Standard on all platforms.

use encoding_rs::{DecoderResult, Encoding};

/// Resolve an encoding label case-insensitively.
///
/// `gb2312` and `gbk` both resolve to the GBK codec, `gb18030` to GB18030.
pub fn resolve(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decode bytes, replacing malformed sequences with U+FFFD.
///
/// No BOM sniffing: the bytes are taken as `encoding` unconditionally.
/// The flag reports whether any replacement happened.
pub fn decode_lossy(data: &[u8], encoding: &'static Encoding) -> (String, bool) {
    let (decoded, had_errors) = encoding.decode_without_bom_handling(data);
    (decoded.into_owned(), had_errors)
}

/// Decode bytes, failing on the first malformed sequence.
///
/// With `last == false` the input is treated as a prefix of a longer stream,
/// so an incomplete multi-byte sequence at the very end is not an error.
pub fn decode_strict(data: &[u8], encoding: &'static Encoding, last: bool) -> Option<String> {
    if last {
        return encoding
            .decode_without_bom_handling_and_without_replacement(data)
            .map(|s| s.into_owned());
    }

    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder.max_utf8_buffer_length_without_replacement(data.len())?;
    let mut out = String::with_capacity(capacity);
    let (result, _read) = decoder.decode_to_string_without_replacement(data, &mut out, false);
    match result {
        DecoderResult::InputEmpty => Some(out),
        DecoderResult::OutputFull | DecoderResult::Malformed(_, _) => None,
    }
}

/// Strict UTF-8 view of the bytes, BOM included as U+FEFF.
pub fn decode_utf8_strict(data: &[u8]) -> Option<&str> {
    std::str::from_utf8(data).ok()
}

pub fn is_ascii(data: &[u8]) -> bool {
    data.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    // GBK encoding of "你好世界"
    const NI_HAO_SHI_JIE: &[u8] = &[0xC4, 0xE3, 0xBA, 0xC3, 0xCA, 0xC0, 0xBD, 0xE7];

    #[test]
    fn test_resolve_legacy_labels() {
        assert_eq!(resolve("GB2312"), Some(encoding_rs::GBK));
        assert_eq!(resolve("gbk"), Some(encoding_rs::GBK));
        assert_eq!(resolve("GB18030"), Some(encoding_rs::GB18030));
        assert_eq!(resolve(" utf-8 "), Some(encoding_rs::UTF_8));
        assert_eq!(resolve("INVALID_ENCODING_LABEL"), None);
    }

    #[test]
    fn test_gbk_conversion() {
        let (text, had_errors) = decode_lossy(NI_HAO_SHI_JIE, encoding_rs::GBK);
        assert_eq!(text, "你好世界");
        assert!(!had_errors);
    }

    #[test]
    fn test_lossy_decode_replaces_malformed() {
        // 0xFF is never a valid GBK lead byte
        let data = [b'a', 0xFF, b'b'];
        let (text, had_errors) = decode_lossy(&data, encoding_rs::GBK);
        assert_eq!(text, "a\u{FFFD}b");
        assert!(had_errors);
    }

    #[test]
    fn test_strict_decode_rejects_malformed() {
        assert_eq!(decode_strict(NI_HAO_SHI_JIE, encoding_rs::GBK, true).as_deref(), Some("你好世界"));
        assert!(decode_strict(&[b'a', 0xFF], encoding_rs::GBK, true).is_none());
    }

    #[test]
    fn test_strict_decode_tolerates_cut_prefix() {
        // Lead byte of the last character without its trail byte
        let cut = &NI_HAO_SHI_JIE[..7];
        assert!(decode_strict(cut, encoding_rs::GBK, true).is_none());
        assert_eq!(decode_strict(cut, encoding_rs::GBK, false).as_deref(), Some("你好世"));
    }

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(decode_utf8_strict(b"Hello, World!"), Some("Hello, World!"));
        assert_eq!(decode_utf8_strict(NI_HAO_SHI_JIE), None);
        assert!(is_ascii(b"plain"));
        assert!(!is_ascii(NI_HAO_SHI_JIE));
    }
}
