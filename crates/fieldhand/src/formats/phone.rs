// ABOUTME: Phone number normalization into the "+90 5XX XXX XX XX" display form.
// ABOUTME: Numbers that do not normalize to twelve digits are returned trimmed and otherwise untouched.

/// Country prefix every normalized number carries.
const COUNTRY_CODE: &str = "90";

/// Normalizes a Turkish phone number for display.
///
/// Keeps only digits, drops a leading international `00`, then adds the
/// country code when it is missing: a trunk `0` becomes `90`, and a bare
/// ten-digit mobile number starting with `5` gets `90` in front. A twelve-digit
/// result is grouped as `+90 XXX XXX XX XX`; anything else comes back as
/// `raw.trim()`.
pub fn format_phone_number(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if let Some(rest) = digits.strip_prefix("00") {
        digits = rest.to_string();
    }

    if !digits.starts_with(COUNTRY_CODE) {
        if let Some(rest) = digits.strip_prefix('0') {
            digits = format!("{}{}", COUNTRY_CODE, rest);
        } else if digits.len() == 10 && digits.starts_with('5') {
            digits = format!("{}{}", COUNTRY_CODE, digits);
        }
    }

    if digits.len() != 12 {
        return raw.trim().to_string();
    }

    format!(
        "+{} {} {} {} {}",
        COUNTRY_CODE,
        &digits[2..5],
        &digits[5..8],
        &digits[8..10],
        &digits[10..12]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_trunk_prefixed_number() {
        assert_eq!(format_phone_number("0555 123 45 67"), "+90 555 123 45 67");
    }

    #[test]
    fn test_formats_bare_mobile_number() {
        assert_eq!(format_phone_number("5391234567"), "+90 539 123 45 67");
    }

    #[test]
    fn test_formats_international_forms() {
        assert_eq!(format_phone_number("+90 (539) 889-33-21"), "+90 539 889 33 21");
        assert_eq!(format_phone_number("0090 539 889 33 21"), "+90 539 889 33 21");
        assert_eq!(format_phone_number("905398893321"), "+90 539 889 33 21");
    }

    #[test]
    fn test_returns_trimmed_input_when_not_normalizable() {
        assert_eq!(format_phone_number("  12345 "), "12345");
        assert_eq!(format_phone_number(" ext. 12 "), "ext. 12");
        assert_eq!(format_phone_number("+1 415 555 0100"), "+1 415 555 0100");
    }

    #[test]
    fn test_empty_input_is_empty() {
        assert_eq!(format_phone_number(""), "");
        assert_eq!(format_phone_number("   "), "");
    }
}
