//! Fixed-width UTF-8 string fields
//!
//! A field of `width` bytes holds an `i32` byte length (native order)
//! followed by the UTF-8 payload, zero padded to the end of the field.
//! Payloads longer than `width - 4` bytes are cut on a character boundary.

use crate::bits::SIZE_OF_INT;
use byteorder::{ByteOrder, NativeEndian};
use thiserror::Error;

/// Errors raised while reading or writing a fixed-width string field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixedStrError {
    /// Field cannot even hold the length prefix
    #[error("Field of {width} bytes is too narrow for a length prefix")]
    FieldTooNarrow {
        /// Width of the offending field
        width: usize,
    },

    /// Length prefix does not fit the field
    #[error("Declared length {declared} exceeds field capacity {capacity}")]
    InvalidLength {
        /// Length found in the prefix
        declared: i64,
        /// Payload capacity of the field
        capacity: usize,
    },

    /// Payload is not valid UTF-8
    #[error("Field payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Outcome of encoding a string into a fixed-width field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    /// Payload bytes written after the length prefix
    pub written: usize,
    /// Whether the input had to be cut to fit
    pub truncated: bool,
}

/// Payload capacity of a field `width` bytes wide
#[must_use]
pub const fn capacity(width: usize) -> usize {
    width.saturating_sub(SIZE_OF_INT)
}

/// Check whether `value` fits a field `width` bytes wide without truncation
#[must_use]
pub const fn fits(value: &str, width: usize) -> bool {
    width >= SIZE_OF_INT && value.len() <= capacity(width)
}

/// Longest prefix of `value` that is at most `max` bytes and ends on a char boundary
#[must_use]
pub fn truncate_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Encode `value` into `field`, overwriting all of it
///
/// # Errors
///
/// Returns an error if the field is narrower than the length prefix.
pub fn encode(field: &mut [u8], value: &str) -> Result<Encoded, FixedStrError> {
    let width = field.len();
    if width < SIZE_OF_INT {
        return Err(FixedStrError::FieldTooNarrow { width });
    }

    let payload = truncate_to_boundary(value, capacity(width));
    let declared = i32::try_from(payload.len()).map_err(|_| FixedStrError::InvalidLength {
        declared: i64::try_from(payload.len()).unwrap_or(i64::MAX),
        capacity: capacity(width),
    })?;

    field.fill(0);
    let (prefix, body) = field.split_at_mut(SIZE_OF_INT);
    NativeEndian::write_i32(prefix, declared);
    body[..payload.len()].copy_from_slice(payload.as_bytes());

    Ok(Encoded {
        written: payload.len(),
        truncated: payload.len() < value.len(),
    })
}

/// Decode the string stored in `field`
///
/// # Errors
///
/// Returns an error if the prefix is negative or larger than the field,
/// or if the payload is not valid UTF-8.
pub fn decode(field: &[u8]) -> Result<&str, FixedStrError> {
    let width = field.len();
    if width < SIZE_OF_INT {
        return Err(FixedStrError::FieldTooNarrow { width });
    }

    let declared = NativeEndian::read_i32(&field[..SIZE_OF_INT]);
    let length = usize::try_from(declared)
        .ok()
        .filter(|length| *length <= capacity(width))
        .ok_or(FixedStrError::InvalidLength {
            declared: i64::from(declared),
            capacity: capacity(width),
        })?;

    Ok(std::str::from_utf8(
        &field[SIZE_OF_INT..SIZE_OF_INT + length],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_with_zeros() {
        let mut field = [0xAAu8; 16];
        let encoded = encode(&mut field, "gw").unwrap();

        assert_eq!(encoded, Encoded { written: 2, truncated: false });
        assert_eq!(NativeEndian::read_i32(&field[..4]), 2);
        assert_eq!(&field[4..6], b"gw");
        assert!(field[6..].iter().all(|b| *b == 0));
        assert_eq!(decode(&field).unwrap(), "gw");
    }

    #[test]
    fn test_encode_truncates_on_char_boundary() {
        // 4 prefix bytes leave room for 5 payload bytes; "é" is 2 bytes
        let mut field = [0u8; 9];
        let encoded = encode(&mut field, "abcdé").unwrap();

        assert!(encoded.truncated);
        assert_eq!(encoded.written, 4);
        assert_eq!(decode(&field).unwrap(), "abcd");
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let mut field = [0u8; 8];
        let encoded = encode(&mut field, "abcd").unwrap();
        assert!(!encoded.truncated);
        assert!(fits("abcd", 8));
        assert!(!fits("abcde", 8));
    }

    #[test]
    fn test_narrow_field_is_rejected() {
        let mut field = [0u8; 3];
        assert_eq!(
            encode(&mut field, "x"),
            Err(FixedStrError::FieldTooNarrow { width: 3 })
        );
        assert!(!fits("", 3));
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        let mut field = [0u8; 8];
        NativeEndian::write_i32(&mut field[..4], 5);
        assert!(matches!(
            decode(&field),
            Err(FixedStrError::InvalidLength { declared: 5, capacity: 4 })
        ));

        NativeEndian::write_i32(&mut field[..4], -1);
        assert!(decode(&field).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let mut field = [0u8; 8];
        NativeEndian::write_i32(&mut field[..4], 2);
        field[4] = 0xC3;
        field[5] = 0x28;
        assert!(matches!(decode(&field), Err(FixedStrError::InvalidUtf8(_))));
    }

    #[test]
    fn test_zeroed_field_decodes_empty() {
        let field = [0u8; 128];
        assert_eq!(decode(&field).unwrap(), "");
    }
}
