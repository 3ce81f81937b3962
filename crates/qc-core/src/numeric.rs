use crate::QcError;

/// Parse the leading decimal number of `text`, ignoring surrounding whitespace
/// and any trailing garbage (`"12.5 ppm"` parses as `12.5`).
///
/// Returns `None` when no digits lead the string or the result is not finite.
pub fn parse_leading_f64(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }

    // Optional exponent, only consumed when well formed.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`parse_leading_f64`] but reports what failed to parse.
pub fn require_f64(text: &str, what: &'static str) -> Result<f64, QcError> {
    parse_leading_f64(text).ok_or_else(|| QcError::NotANumber {
        what,
        text: text.to_string(),
    })
}

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, QcError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(QcError::NonFinite { what, value: v })
    }
}
