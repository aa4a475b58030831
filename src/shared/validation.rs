use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for field names accepted by the data backend
    /// Lowercase snake_case identifiers only, so they can be spliced into SQL
    /// - Valid: "name", "category_id", "created_at"
    /// - Invalid: "Name", "1col", "name;--", "name text"
    pub static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap();

    /// Regex for human-readable product codes
    /// Uppercase letters, digits, with single separators ('-', '.', '/')
    /// - Valid: "VB-440", "M8.30", "REF123", "A/12"
    /// - Invalid: "-VB", "VB-", "VB--440", "vb-440", "VB 440"
    pub static ref PRODUCT_CODE_REGEX: Regex =
        Regex::new(r"^[A-Z0-9]+(?:[-./][A-Z0-9]+)*$").unwrap();

    /// Regex for phone numbers: optional leading '+', digits with spaces, dots or dashes
    /// - Valid: "+33 6 12 34 56 78", "01.23.45.67.89", "0612345678"
    /// - Invalid: "phone", "12", "+33 6 12 34 56 78 ext"
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 .\-]{5,20}[0-9]$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_regex() {
        assert!(IDENTIFIER_REGEX.is_match("name"));
        assert!(IDENTIFIER_REGEX.is_match("category_id"));
        assert!(IDENTIFIER_REGEX.is_match("_private"));
        assert!(!IDENTIFIER_REGEX.is_match("Name"));
        assert!(!IDENTIFIER_REGEX.is_match("1col"));
        assert!(!IDENTIFIER_REGEX.is_match("name;--"));
        assert!(!IDENTIFIER_REGEX.is_match("name text"));
        assert!(!IDENTIFIER_REGEX.is_match(""));
    }

    #[test]
    fn test_product_code_regex() {
        assert!(PRODUCT_CODE_REGEX.is_match("VB-440"));
        assert!(PRODUCT_CODE_REGEX.is_match("M8.30"));
        assert!(PRODUCT_CODE_REGEX.is_match("REF123"));
        assert!(PRODUCT_CODE_REGEX.is_match("A/12"));
        assert!(!PRODUCT_CODE_REGEX.is_match("-VB")); // starts with separator
        assert!(!PRODUCT_CODE_REGEX.is_match("VB-")); // ends with separator
        assert!(!PRODUCT_CODE_REGEX.is_match("VB--440")); // double separator
        assert!(!PRODUCT_CODE_REGEX.is_match("vb-440")); // lowercase
        assert!(!PRODUCT_CODE_REGEX.is_match("VB 440")); // space
    }

    #[test]
    fn test_phone_regex() {
        assert!(PHONE_REGEX.is_match("+33 6 12 34 56 78"));
        assert!(PHONE_REGEX.is_match("01.23.45.67.89"));
        assert!(PHONE_REGEX.is_match("0612345678"));
        assert!(!PHONE_REGEX.is_match("phone"));
        assert!(!PHONE_REGEX.is_match("12"));
    }
}
