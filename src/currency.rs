/// Turn free-form cell text ("$1,234.56", "-$12.00", "—") into an amount.
///
/// Everything except ASCII digits, `.` and `-` is stripped, then the longest
/// numeric prefix is parsed. Anything unparseable counts as zero.
pub fn parse_currency(text: Option<&str>) -> f64 {
    let Some(text) = text else {
        return 0.0;
    };
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    match leading_number(&cleaned).parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Longest prefix of the form `-?digits[.digits]` (also `.5`, `5.`).
fn leading_number(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        let frac_digits = frac_end - end - 1;
        if digits + frac_digits > 0 {
            end = frac_end;
            digits += frac_digits;
        }
    }
    if digits == 0 {
        return "";
    }
    &s[..end]
}
