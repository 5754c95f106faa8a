//! Free-form Decimal Parsing

use crate::error::ValidationError;

/// Parse a decimal number typed into a form field.
///
/// Surrounding whitespace is ignored and a decimal comma is accepted. An
/// empty field is reported as missing.
pub fn parse_decimal(field: &str, text: &str) -> Result<f64, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }

    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: field.to_string(),
            text: text.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_decimals() {
        assert_eq!(parse_decimal("HFA", "12.50"), Ok(12.5));
        assert_eq!(parse_decimal("HFA", "  -3 "), Ok(-3.0));
        assert_eq!(parse_decimal("HFA", "1e3"), Ok(1000.0));
    }

    #[test]
    fn test_accepts_decimal_comma() {
        assert_eq!(parse_decimal("H/Q", "0,62"), Ok(0.62));
    }

    #[test]
    fn test_empty_field_is_missing() {
        assert_eq!(
            parse_decimal("KVA", "   "),
            Err(ValidationError::MissingField("KVA".to_string()))
        );
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        let err = parse_decimal("KVM", "abc").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
        assert!(err.to_string().contains("KVM"));
    }

    #[test]
    fn test_nan_text_parses_but_is_not_finite() {
        // Finiteness is the validator's job; parsing only checks syntax.
        assert!(parse_decimal("AVA", "NaN").unwrap().is_nan());
    }
}
