use crate::utils::error::CustomError;

pub fn validate_password(password: &str) -> Result<(), CustomError> {
    // Check password length
    if password.len() < 8 || password.len() > 20 {
        return Err(CustomError::ValidationError(
            "Password must be between 8 and 20 characters long.".into(),
        ));
    }

    // Check for at least one lowercase letter, one uppercase letter, and one digit
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_lowercase || !has_uppercase || !has_digit {
        return Err(CustomError::ValidationError(
            "Password must include at least one uppercase letter, one lowercase letter, and one number.".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_compliant_password() {
        assert!(validate_password("Passw0rd").is_ok());
    }

    #[test]
    fn rejects_short_and_long_passwords() {
        assert!(validate_password("Ab1").is_err());
        assert!(validate_password("Abcdefgh1Abcdefgh1Abc").is_err());
    }

    #[test]
    fn rejects_missing_character_classes() {
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }
}
