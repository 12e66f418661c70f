use std::borrow::Cow;

/// Upper-cased, underscore-separated header with BOM and zero-width marks removed.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.trim().to_ascii_uppercase().replace(' ', "_")
}

/// Decode an upload as UTF-8, falling back to Latin-1 byte-for-byte.
pub(crate) fn decode_upload(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), false),
        Err(_) => (Cow::Owned(bytes.iter().map(|&byte| byte as char).collect()), true),
    }
}
