//! Integer-cent money helpers.
//!
//! Amounts are typed by users as `12`, `12.5`, `12,50` or `1 234,56`; they are
//! stored as cents and rendered with two decimals and a dot separator.

use super::ValidationError;

/// Amount in hundredths of the currency unit.
pub type Cents = i64;

/// Renders cents as `1234.56` (`-0.05` for negatives).
pub fn format_cents(value: Cents) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parses a user-typed amount into cents.
///
/// # Errors
/// - Returns an error when the text is empty, has more than two decimals, or
///   contains anything but digits, one separator and an optional sign.
pub fn parse_cents(field: &'static str, text: &str) -> Result<Cents, ValidationError> {
    let compact: String = text
        .trim()
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return Err(ValidationError::new(field, "amount is empty"));
    }

    let (negative, digits) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };
    let normalized = digits.replace(',', ".");
    let (units, fraction) = match normalized.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (normalized.as_str(), ""),
    };

    let all_digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
    if (units.is_empty() && fraction.is_empty())
        || !all_digits(units)
        || !all_digits(fraction)
        || fraction.len() > 2
    {
        return Err(ValidationError::new(
            field,
            format!("`{text}` is not a valid amount"),
        ));
    }

    let units_value: i64 = if units.is_empty() {
        0
    } else {
        units
            .parse()
            .map_err(|_| ValidationError::new(field, format!("`{text}` is out of range")))?
    };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
        _ => fraction
            .parse()
            .map_err(|_| ValidationError::new(field, format!("`{text}` is not a valid amount")))?,
    };

    let cents = units_value
        .checked_mul(100)
        .and_then(|value| value.checked_add(fraction_value))
        .ok_or_else(|| ValidationError::new(field, format!("`{text}` is out of range")))?;
    Ok(if negative { -cents } else { cents })
}
