//! Text encoding adapter.
//!
//! The facade carries text as UTF-8. The Win32 backend stores
//! NUL-terminated UTF-16 (`CF_UNICODETEXT`); the X11 backend speaks
//! `UTF8_STRING` and, for old clients, Latin-1 `STRING`. Conversions are
//! strict: anything that cannot round-trip is an [`EncodingError`], never
//! a replacement character.

/// A text conversion that could not be performed losslessly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid UTF-8 after byte {valid_up_to}")]
    Utf8 { valid_up_to: usize },

    #[error("unpaired UTF-16 surrogate")]
    Utf16,

    /// A NUL inside the text would silently truncate it on NUL-terminated
    /// targets.
    #[error("interior NUL at byte {0}")]
    InteriorNul(usize),

    #[error("U+{0:04X} is not representable in Latin-1")]
    NotLatin1(u32),
}

/// Borrow `bytes` as UTF-8.
pub fn check_utf8(bytes: &[u8]) -> Result<&str, EncodingError> {
    std::str::from_utf8(bytes).map_err(|e| EncodingError::Utf8 {
        valid_up_to: e.valid_up_to(),
    })
}

/// Encode as NUL-terminated UTF-16.
pub fn utf8_to_wide(text: &str) -> Result<Vec<u16>, EncodingError> {
    if let Some(pos) = text.find('\0') {
        return Err(EncodingError::InteriorNul(pos));
    }
    let mut wide: Vec<u16> = text.encode_utf16().collect();
    wide.push(0);
    Ok(wide)
}

/// Decode UTF-16 up to the first NUL (or the end of the slice).
pub fn wide_to_utf8(wide: &[u16]) -> Result<String, EncodingError> {
    let end = wide.iter().position(|&unit| unit == 0).unwrap_or(wide.len());
    String::from_utf16(&wide[..end]).map_err(|_| EncodingError::Utf16)
}

/// Native-endian byte image of UTF-16 code units, as stored in global memory.
pub fn wide_to_bytes(wide: &[u16]) -> Vec<u8> {
    wide.iter().flat_map(|unit| unit.to_ne_bytes()).collect()
}

/// Inverse of [`wide_to_bytes`]. A trailing odd byte is ignored.
pub fn bytes_to_wide(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode for the X11 `STRING` target.
pub fn utf8_to_latin1(text: &str) -> Result<Vec<u8>, EncodingError> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| EncodingError::NotLatin1(u32::from(c))))
        .collect()
}

/// Decode an X11 `STRING` reply. Every byte is a valid Latin-1 code point.
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
