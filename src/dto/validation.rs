//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::{CODE_LENGTH, normalize_code};

/// Validates a user-typed room or invite code: six letters or digits once trimmed,
/// case-insensitive.
///
/// # Examples
///
/// ```ignore
/// validate_code("ab12cd")   // Ok
/// validate_code(" AB12CD ") // Ok
/// validate_code("AB12C")    // Err - too short
/// validate_code("AB-2CD")   // Err - symbol
/// ```
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    let code = normalize_code(code);
    if code.len() != CODE_LENGTH {
        let mut err = ValidationError::new("code_length");
        err.message = Some(
            format!(
                "Code must be exactly {CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("code_format");
        err.message = Some("Code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a contact phone number: digits with optional `+`, spaces or dashes, 7 to 15
/// digits in total.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    let digits = phone.bytes().filter(u8::is_ascii_digit).count();
    let allowed = phone
        .bytes()
        .enumerate()
        .all(|(i, b)| b.is_ascii_digit() || b == b' ' || b == b'-' || (i == 0 && b == b'+'));

    if !allowed || !(7..=15).contains(&digits) {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must contain 7 to 15 digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code_valid() {
        assert!(validate_code("AB12CD").is_ok());
        assert!(validate_code(" ab12cd ").is_ok());
        assert!(validate_code("000000").is_ok());
    }

    #[test]
    fn test_validate_code_invalid() {
        assert!(validate_code("AB12C").is_err()); // too short
        assert!(validate_code("AB12CDE").is_err()); // too long
        assert!(validate_code("AB-2CD").is_err()); // symbol
        assert!(validate_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+57 300 123 4567").is_ok());
        assert!(validate_phone("300-1234567").is_ok());
        assert!(validate_phone("12345").is_err()); // too few digits
        assert!(validate_phone("300 12a 4567").is_err()); // letter
        assert!(validate_phone("57+3001234567").is_err()); // misplaced plus
    }
}
