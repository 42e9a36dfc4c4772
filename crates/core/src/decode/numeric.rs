//! Byte-level readers for text, zoned decimal and packed decimal storage.

use crate::clause::SignPosition;
use copylens_profile::{OverpunchTable, PackedSignRule};

/// Why a numeric field's bytes are not a valid encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumericError {
    /// A byte that is neither a digit nor a sign form valid at its position.
    Byte { position: usize, byte: u8 },
    /// A packed digit nibble above 9.
    DigitNibble { position: usize, nibble: u8 },
    /// A packed sign nibble the sign rule does not accept.
    SignNibble { nibble: u8 },
    /// More digits than fit in 128 bits.
    Overflow,
}

impl std::fmt::Display for NumericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericError::Byte { position, byte } => {
                write!(f, "byte 0x{byte:02X} at position {position} is not a valid digit")
            }
            NumericError::DigitNibble { position, nibble } => {
                write!(f, "digit nibble 0x{nibble:X} in byte {position}")
            }
            NumericError::SignNibble { nibble } => write!(f, "sign nibble 0x{nibble:X}"),
            NumericError::Overflow => write!(f, "value exceeds 128-bit range"),
        }
    }
}

/// ISO-8859-1 text with trailing spaces removed.
pub(crate) fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
    bytes[..end].iter().map(|&b| char::from(b)).collect()
}

fn push_digit(acc: i128, digit: u8) -> Result<i128, NumericError> {
    acc.checked_mul(10)
        .and_then(|v| v.checked_add(i128::from(digit)))
        .ok_or(NumericError::Overflow)
}

/// Zoned decimal: one digit per byte with the sign placed as `sign` says.
///
/// Returns the unscaled value. `None` sign means unsigned: every byte must
/// be an ASCII digit.
pub(crate) fn zoned(
    bytes: &[u8],
    sign: Option<SignPosition>,
    overpunch: &OverpunchTable,
) -> Result<i128, NumericError> {
    let plain = |position: usize, byte: u8| {
        if byte.is_ascii_digit() {
            Ok(byte - b'0')
        } else {
            Err(NumericError::Byte { position, byte })
        }
    };
    let separate = |position: usize, byte: u8| match byte {
        b'+' => Ok(false),
        b'-' => Ok(true),
        _ => Err(NumericError::Byte { position, byte }),
    };

    let last = bytes.len().saturating_sub(1);
    let mut acc = 0i128;
    let mut negative = false;
    for (position, &byte) in bytes.iter().enumerate() {
        let digit = match sign {
            Some(SignPosition::TrailingOverpunch) if position == last => {
                let (digit, neg) =
                    overpunch.lookup(byte).ok_or(NumericError::Byte { position, byte })?;
                negative = neg;
                digit
            }
            Some(SignPosition::LeadingOverpunch) if position == 0 => {
                let (digit, neg) =
                    overpunch.lookup(byte).ok_or(NumericError::Byte { position, byte })?;
                negative = neg;
                digit
            }
            Some(SignPosition::TrailingSeparate) if position == last => {
                negative = separate(position, byte)?;
                continue;
            }
            Some(SignPosition::LeadingSeparate) if position == 0 => {
                negative = separate(position, byte)?;
                continue;
            }
            _ => plain(position, byte)?,
        };
        acc = push_digit(acc, digit)?;
    }
    Ok(if negative { -acc } else { acc })
}

/// Packed decimal: two digit nibbles per byte, the final nibble is the sign.
///
/// Returns the unscaled value. An unsigned field still carries a sign
/// nibble; it is validated but a negative sign is honored.
pub(crate) fn packed(bytes: &[u8], rule: PackedSignRule) -> Result<i128, NumericError> {
    let Some((&sign_byte, _)) = bytes.split_last() else {
        return Ok(0);
    };
    let mut acc = 0i128;
    for (position, &byte) in bytes.iter().enumerate() {
        let high = byte >> 4;
        let low = byte & 0x0F;
        if high > 9 {
            return Err(NumericError::DigitNibble {
                position,
                nibble: high,
            });
        }
        acc = push_digit(acc, high)?;
        if position + 1 < bytes.len() {
            if low > 9 {
                return Err(NumericError::DigitNibble {
                    position,
                    nibble: low,
                });
            }
            acc = push_digit(acc, low)?;
        }
    }
    let nibble = sign_byte & 0x0F;
    let negative = rule
        .is_negative(nibble)
        .ok_or(NumericError::SignNibble { nibble })?;
    Ok(if negative { -acc } else { acc })
}
