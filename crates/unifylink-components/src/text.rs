//! Fixed-width, NUL-padded text fields (model names and the like).

use std::borrow::Cow;

/// Pack `text` into a NUL-padded field, truncating so at least one NUL
/// terminator remains.
pub fn fixed_str<const N: usize>(text: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let len = text.len().min(N.saturating_sub(1));
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
    field
}

/// Read a NUL-padded field up to its first NUL.
pub fn str_from_fixed(field: &[u8]) -> Cow<'_, str> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end])
}
