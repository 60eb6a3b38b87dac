use super::error::ParseError;

/// Significant digits used when re-rendering a parsed value to find
/// where its unit suffix starts.
const UNITS_PRECISION: usize = 10;

/// Parse the numeric prefix of a tuple value.
///
/// An empty value counts as `1` (`measure.hits` means one hit). Otherwise
/// digits and the first `.` are accumulated until any other byte, so
/// `"42.5ms"` is `42.5` and `"3.1.4"` is `3.1`.
pub fn float_prefix(value: &[u8]) -> Result<f64, ParseError> {
    if value.is_empty() {
        return Ok(1.0);
    }

    let mut end = 0;
    let mut digits = 0;
    let mut found_decimal = false;
    for &b in value {
        if b == b'.' && !found_decimal {
            found_decimal = true;
        } else if b.is_ascii_digit() {
            digits += 1;
        } else {
            break;
        }
        end += 1;
    }

    let input = String::from_utf8_lossy(value).into_owned();
    if digits == 0 {
        return Err(ParseError::NoNumber { input });
    }

    // The prefix is ASCII digits and at most one '.', so this is lossless.
    let numeral = std::str::from_utf8(&value[..end]).map_err(|e| ParseError::InvalidNumber {
        input: input.clone(),
        reason: e.to_string(),
    })?;
    numeral.parse::<f64>().map_err(|e| ParseError::InvalidNumber {
        input,
        reason: e.to_string(),
    })
}

/// Render `value` the way a `%g` formatter with 10 significant digits does:
/// fixed notation unless the exponent is below -4 or at least the number of
/// significant digits, trailing zeros removed.
pub fn render_general(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let neg = value.is_sign_negative() && value != 0.0;
    let scientific = format!("{:.*e}", UNITS_PRECISION - 1, value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let mut digits: Vec<u8> = mantissa.bytes().filter(u8::is_ascii_digit).collect();
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    // Position of the decimal point relative to the digit string.
    let dp = if digits.is_empty() { 0 } else { exponent + 1 };
    let nd = digits.len() as i32;

    let mut eprec = UNITS_PRECISION as i32;
    if eprec > nd && nd >= dp {
        eprec = nd;
    }

    let mut out = String::with_capacity(16);
    if neg {
        out.push('-');
    }

    let exp = dp - 1;
    if exp < -4 || exp >= eprec {
        out.push(digits[0] as char);
        if nd > 1 {
            out.push('.');
            out.extend(digits[1..].iter().map(|&d| d as char));
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        let magnitude = exp.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        out.push_str(&magnitude.to_string());
        return out;
    }

    if dp > 0 {
        for i in 0..dp {
            out.push(digits.get(i as usize).map_or('0', |&d| d as char));
        }
    } else {
        out.push('0');
    }

    let decimals = (nd - dp).max(0);
    if decimals > 0 {
        out.push('.');
        for i in 0..decimals {
            let j = dp + i;
            let d = if j >= 0 && j < nd { digits[j as usize] as char } else { '0' };
            out.push(d);
        }
    }

    out
}

/// Strip the numeral from a tuple value and return what follows as units.
///
/// This is a length heuristic: the parsed number is re-rendered with
/// [`render_general`] and that many leading bytes are dropped. `"100ms"`
/// gives `"ms"`, but `"007ms"` gives `"7ms"` because `7` renders shorter
/// than the original digits. A rendering longer than the value yields no
/// units.
pub fn strip_numeric_prefix(value: &[u8]) -> String {
    if value.is_empty() {
        return String::new();
    }
    let Ok(parsed) = float_prefix(value) else {
        return String::new();
    };
    let rendered = render_general(parsed);
    value
        .get(rendered.len()..)
        .map(|units| String::from_utf8_lossy(units).into_owned())
        .unwrap_or_default()
}
