//! WGSL numeric literal scanning and conversion.

use thiserror::Error;

/// A parsed numeric literal, concretized per its suffix.
///
/// Unsuffixed literals stay abstract; the lowerer concretizes them at typed
/// use sites.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Abstract integer (unsuffixed).
    AbstractInt(i64),
    /// Abstract float (unsuffixed).
    AbstractFloat(f64),
    /// Concrete `i32`.
    I32(i32),
    /// Concrete `u32`.
    U32(u32),
    /// Concrete `f32`.
    F32(f32),
}

#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum NumberError {
    #[error("invalid numeric literal format")]
    Invalid,
    #[error("numeric literal not representable by target type")]
    NotRepresentable,
}

/// Scan a numeric literal from the start of `input`.
///
/// Returns the converted number (or the conversion error) and the rest of
/// the input. The caller guarantees that `input` starts with a digit, or
/// with a `.` followed by a digit.
pub(in crate::front::wgsl) fn consume_number(input: &str) -> (Result<Number, NumberError>, &str) {
    if let Some(rest) = strip_hex_prefix(input) {
        return consume_hex(rest, input);
    }

    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut is_float = false;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        // don't claim the dot unless a digit follows, so that `1.x` keeps
        // working as a (weird) member access
        if pos + 1 < bytes.len() && bytes[pos + 1].is_ascii_digit() {
            is_float = true;
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        } else if pos + 1 >= bytes.len() || !is_ident_char(bytes[pos + 1]) {
            // trailing dot as in `1.`
            is_float = true;
            pos += 1;
        }
    }
    // scientific notation
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp_pos = pos + 1;
        if exp_pos < bytes.len() && (bytes[exp_pos] == b'+' || bytes[exp_pos] == b'-') {
            exp_pos += 1;
        }
        if exp_pos < bytes.len() && bytes[exp_pos].is_ascii_digit() {
            is_float = true;
            pos = exp_pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let digits = &input[..pos];
    let suffix = match bytes.get(pos).copied() {
        Some(c) if matches!(c, b'i' | b'u' | b'f' | b'h') => {
            pos += 1;
            Some(c)
        }
        _ => None,
    };
    let rest = &input[pos..];

    let value = if is_float {
        convert_float(digits, suffix)
    } else {
        convert_decimal_int(digits, suffix)
    };
    (value, rest)
}

fn is_ident_char(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn strip_hex_prefix(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
}

fn consume_hex<'a>(after_prefix: &'a str, _whole: &'a str) -> (Result<Number, NumberError>, &'a str) {
    let bytes = after_prefix.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
        pos += 1;
    }
    if pos == 0 {
        return (Err(NumberError::Invalid), after_prefix);
    }
    // hex floats are not supported
    if matches!(bytes.get(pos).copied(), Some(b'.') | Some(b'p') | Some(b'P')) {
        return (Err(NumberError::Invalid), &after_prefix[pos..]);
    }
    let digits = &after_prefix[..pos];
    let suffix = match bytes.get(pos).copied() {
        Some(c) if matches!(c, b'i' | b'u') => {
            pos += 1;
            Some(c)
        }
        _ => None,
    };
    let rest = &after_prefix[pos..];

    let value = match u64::from_str_radix(digits, 16) {
        Ok(value) => match suffix {
            Some(b'i') => int_to_i32(value),
            Some(b'u') => int_to_u32(value),
            _ => {
                if value > i64::MAX as u64 {
                    Err(NumberError::NotRepresentable)
                } else {
                    Ok(Number::AbstractInt(value as i64))
                }
            }
        },
        Err(_) => Err(NumberError::NotRepresentable),
    };
    (value, rest)
}

fn int_to_i32(value: u64) -> Result<Number, NumberError> {
    if value > i32::MAX as u64 {
        Err(NumberError::NotRepresentable)
    } else {
        Ok(Number::I32(value as i32))
    }
}

fn int_to_u32(value: u64) -> Result<Number, NumberError> {
    if value > u32::MAX as u64 {
        Err(NumberError::NotRepresentable)
    } else {
        Ok(Number::U32(value as u32))
    }
}

fn convert_decimal_int(digits: &str, suffix: Option<u8>) -> Result<Number, NumberError> {
    if digits.is_empty() {
        return Err(NumberError::Invalid);
    }
    match suffix {
        Some(b'i') => digits
            .parse::<i32>()
            .map(Number::I32)
            .map_err(|_| NumberError::NotRepresentable),
        Some(b'u') => digits
            .parse::<u32>()
            .map(Number::U32)
            .map_err(|_| NumberError::NotRepresentable),
        Some(b'f') => float_to_f32(digits),
        Some(b'h') => Err(NumberError::Invalid),
        _ => digits
            .parse::<i64>()
            .map(Number::AbstractInt)
            .map_err(|_| NumberError::NotRepresentable),
    }
}

fn convert_float(digits: &str, suffix: Option<u8>) -> Result<Number, NumberError> {
    match suffix {
        Some(b'f') => float_to_f32(digits),
        Some(b'h') | Some(b'i') | Some(b'u') => Err(NumberError::Invalid),
        _ => match digits.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Number::AbstractFloat(value)),
            _ => Err(NumberError::NotRepresentable),
        },
    }
}

fn float_to_f32(digits: &str) -> Result<Number, NumberError> {
    match digits.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(Number::F32(value)),
        _ => Err(NumberError::NotRepresentable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Number, NumberError> {
        let (value, rest) = consume_number(input);
        assert!(rest.is_empty(), "leftover input {:?}", rest);
        value
    }

    #[test]
    fn decimal_abstract() {
        assert_eq!(parse("92"), Ok(Number::AbstractInt(92)));
        assert_eq!(parse("0"), Ok(Number::AbstractInt(0)));
    }

    #[test]
    fn suffixes() {
        assert_eq!(parse("10i"), Ok(Number::I32(10)));
        assert_eq!(parse("10u"), Ok(Number::U32(10)));
        assert_eq!(parse("10f"), Ok(Number::F32(10.0)));
        assert_eq!(parse("1.5f"), Ok(Number::F32(1.5)));
    }

    #[test]
    fn floats() {
        assert_eq!(parse("1.5"), Ok(Number::AbstractFloat(1.5)));
        assert_eq!(parse("1."), Ok(Number::AbstractFloat(1.0)));
        assert_eq!(parse("1e3"), Ok(Number::AbstractFloat(1000.0)));
        assert_eq!(parse("1.5e-2"), Ok(Number::AbstractFloat(0.015)));
    }

    #[test]
    fn hex() {
        assert_eq!(parse("0x10"), Ok(Number::AbstractInt(16)));
        assert_eq!(parse("0xffu"), Ok(Number::U32(255)));
        assert_eq!(parse("0x7fffffffi"), Ok(Number::I32(i32::MAX)));
        assert_eq!(parse("0x80000000i"), Err(NumberError::NotRepresentable));
    }

    #[test]
    fn out_of_range() {
        assert_eq!(parse("4294967296u"), Err(NumberError::NotRepresentable));
        assert_eq!(parse("2147483648i"), Err(NumberError::NotRepresentable));
    }

    #[test]
    fn partial_consumption() {
        let (value, rest) = consume_number("92No");
        assert_eq!(value, Ok(Number::AbstractInt(92)));
        assert_eq!(rest, "No");
    }
}
