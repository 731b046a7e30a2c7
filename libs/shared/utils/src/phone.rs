/// Canonical phone form used as the storage and lookup key everywhere.
///
/// Rule: keep ASCII digits only, then keep the trailing 10. This collapses
/// country-code variants ("+917993724192", "917993724192", "7993724192") onto
/// one key. International numbers longer than 10 significant digits are out of
/// scope for this clinic.
pub fn canonical_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits
    }
}

/// Outbound form expected by the messaging provider: country code + canonical.
pub fn with_country_code(canonical: &str, country_code: &str) -> String {
    format!("{}{}", country_code, canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plus_and_country_code() {
        assert_eq!(canonical_phone("+917993724192"), "7993724192");
        assert_eq!(canonical_phone("917993724192"), "7993724192");
        assert_eq!(canonical_phone("7993724192"), "7993724192");
    }

    #[test]
    fn ignores_formatting_characters() {
        assert_eq!(canonical_phone("+91 79937-24192"), "7993724192");
    }

    #[test]
    fn short_numbers_pass_through() {
        assert_eq!(canonical_phone("12345"), "12345");
        assert_eq!(canonical_phone(""), "");
    }

    #[test]
    fn outbound_form_prefixes_country_code() {
        assert_eq!(with_country_code("7993724192", "91"), "917993724192");
    }
}
