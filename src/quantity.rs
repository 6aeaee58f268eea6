//! Resource quantity parsing.
//!
//! Accepts the Kubernetes quantity grammar for byte counts: a decimal number followed by an
//! optional binary suffix (`Ki`..`Ei`), decimal suffix (`k`..`E`) or exponent (`e3`, `E-2`).

use crate::error::QuantityError;

const GIB: u64 = 1024 * 1024 * 1024;

/// Parse a quantity into a whole number of bytes.
pub fn parse_bytes(quantity: &str) -> Result<u64, QuantityError> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return Err(QuantityError::Empty);
    }

    let number_end = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(number_end);
    let number = number.strip_prefix('+').unwrap_or(number);
    if number.is_empty() || number.contains('+') {
        return Err(QuantityError::Invalid(quantity.to_string()));
    }

    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (number, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(QuantityError::Invalid(quantity.to_string()));
    }

    let (base, exponent) =
        suffix_scale(suffix).ok_or_else(|| QuantityError::Invalid(quantity.to_string()))?;

    // Value = digits * base^exponent / 10^frac_len, computed exactly in u128.
    let digits: String = format!("{}{}", int_part, frac_part);
    let mut value: u128 = digits
        .parse()
        .map_err(|_| QuantityError::Overflow(quantity.to_string()))?;
    let mut divisor: u128 = 10u128
        .checked_pow(frac_part.len() as u32)
        .ok_or_else(|| QuantityError::Overflow(quantity.to_string()))?;

    if exponent >= 0 {
        let scale = base
            .checked_pow(exponent as u32)
            .ok_or_else(|| QuantityError::Overflow(quantity.to_string()))?;
        value = value
            .checked_mul(scale)
            .ok_or_else(|| QuantityError::Overflow(quantity.to_string()))?;
    } else {
        let scale = base
            .checked_pow(exponent.unsigned_abs())
            .ok_or_else(|| QuantityError::Overflow(quantity.to_string()))?;
        divisor = divisor
            .checked_mul(scale)
            .ok_or_else(|| QuantityError::Overflow(quantity.to_string()))?;
    }

    if value % divisor != 0 {
        return Err(QuantityError::Fractional(quantity.to_string()));
    }
    u64::try_from(value / divisor).map_err(|_| QuantityError::Overflow(quantity.to_string()))
}

/// Whole gibibytes in a quantity, truncated.
pub fn to_whole_gib(quantity: &str) -> Result<u64, QuantityError> {
    Ok(parse_bytes(quantity)? / GIB)
}

fn suffix_scale(suffix: &str) -> Option<(u128, i32)> {
    let scale = match suffix {
        "" => (10, 0),
        "Ki" => (1024, 1),
        "Mi" => (1024, 2),
        "Gi" => (1024, 3),
        "Ti" => (1024, 4),
        "Pi" => (1024, 5),
        "Ei" => (1024, 6),
        "m" => (10, -3),
        "k" => (10, 3),
        "M" => (10, 6),
        "G" => (10, 9),
        "T" => (10, 12),
        "P" => (10, 15),
        "E" => (10, 18),
        _ => {
            let rest = suffix.strip_prefix('e').or_else(|| suffix.strip_prefix('E'))?;
            let exponent: i32 = rest.parse().ok()?;
            (10, exponent)
        }
    };
    Some(scale)
}
