//! Input decoding for byte-oriented scans.
//!
//! The scanner works on UTF-8 text. Raw bytes are decoded first:
//!
//! 1. A Byte Order Mark selects the initial encoding and is skipped.
//! 2. Without a BOM the input is assumed to be UTF-8, per XML 1.0 §4.3.3.
//! 3. An `encoding="…"` pseudo-attribute in the XML declaration overrides
//!    the initial guess when it names a different encoding.
//!
//! Transcoding is delegated to `encoding_rs`.

/// An error that occurs while decoding raw input bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Detects the encoding of an XML byte stream from its Byte Order Mark.
///
/// Returns the encoding label and the number of BOM bytes to skip.
///
/// # Examples
///
/// ```
/// use xmlscan::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes `bytes` from the named encoding into a UTF-8 `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown to `encoding_rs` or the
/// input contains malformed sequences.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {label}"
        )));
    }
    Ok(text.into_owned())
}

/// Decodes raw XML bytes into UTF-8 text, detecting the encoding.
///
/// # Errors
///
/// Returns `EncodingError` if the bytes are invalid for the detected
/// encoding or the declared encoding is unsupported.
///
/// # Examples
///
/// ```
/// use xmlscan::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"<?xml version=\"1.0\"?><root/>").unwrap();
/// assert!(text.ends_with("<root/>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom_encoding, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];

    if bom_encoding == "UTF-8" {
        return match std::str::from_utf8(content) {
            Ok(text) => match declared_encoding(text.as_bytes()) {
                Some(declared) if !is_utf8_label(&declared) => transcode(content, &declared),
                _ => Ok(text.to_owned()),
            },
            // The declaration itself is ASCII, so it can be read from the
            // raw bytes even when the rest is not UTF-8.
            Err(_) => match declared_encoding(content) {
                Some(declared) => transcode(content, &declared),
                None => Err(EncodingError::new("input is not valid UTF-8")),
            },
        };
    }

    let text = transcode(content, bom_encoding)?;
    match declared_encoding(text.as_bytes()) {
        Some(declared)
            if !declared.eq_ignore_ascii_case(bom_encoding)
                && !declared.eq_ignore_ascii_case("UTF-16") =>
        {
            transcode(content, &declared)
        }
        _ => Ok(text),
    }
}

/// Extracts the `encoding` value of the XML declaration, if any.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(200)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];
    let needle = b"encoding";
    let pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = trim_ascii_start(&decl[pos + needle.len()..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..end];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn is_utf8_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("UTF-8") || label.eq_ignore_ascii_case("UTF8")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_utf16_boms() {
        assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
        assert_eq!(detect_encoding(b"\xFE\xFF\x00<"), ("UTF-16BE", 2));
    }

    #[test]
    fn test_detect_short_input() {
        assert_eq!(detect_encoding(b""), ("UTF-8", 0));
        assert_eq!(detect_encoding(b"\xEF"), ("UTF-8", 0));
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let text = decode_to_utf8(b"\xEF\xBB\xBF<root/>").unwrap();
        assert_eq!(text, "<root/>");
    }

    #[test]
    fn test_decode_declared_latin1() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>".to_vec();
        bytes.extend_from_slice(b"<root>caf\xE9</root>");
        let text = decode_to_utf8(&bytes).unwrap();
        assert!(text.contains("caf\u{e9}"));
    }

    #[test]
    fn test_decode_utf16le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>x</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "<a>x</a>");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode_to_utf8(&[0x80, 0x81, 0x82]).unwrap_err();
        assert_eq!(err.message, "input is not valid UTF-8");
    }

    #[test]
    fn test_transcode_unknown_label() {
        let err = transcode(b"x", "NOT-A-CHARSET").unwrap_err();
        assert!(err.message.contains("unsupported encoding"));
    }

    #[test]
    fn test_declared_encoding_single_quotes() {
        let label = declared_encoding(b"<?xml version='1.0' encoding = 'windows-1252'?>");
        assert_eq!(label.as_deref(), Some("windows-1252"));
        assert_eq!(declared_encoding(b"<root/>"), None);
    }
}
