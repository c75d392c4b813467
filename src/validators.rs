/// Input validators
///
/// Normalizes and checks user-supplied fields before they reach the
/// database: email addresses for accounts, and display names for
/// products and categories.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_LOCAL_PART_LENGTH: usize = 64;
const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 255;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$"
    ).unwrap();
}

/// Normalize an email address: surrounding whitespace removed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an email address and returns its normalized form.
///
/// Two addresses that differ only by case or surrounding whitespace
/// normalize to the same account key.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(email);

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalized.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    let local_part_len = normalized.find('@').unwrap_or(0);
    if local_part_len > MAX_LOCAL_PART_LENGTH || normalized.contains("..") {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(normalized)
}

/// Validates a catalog name (product or category) and returns it trimmed.
pub fn is_valid_name(field: &str, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    let length = trimmed.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort(field.to_string(), MIN_NAME_LENGTH));
    }

    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat(field.to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_emails_are_normalized() {
        assert_eq!(is_valid_email("a@x.com").unwrap(), "a@x.com");
        assert_eq!(is_valid_email("  User@Example.COM ").unwrap(), "user@example.com");
        assert_eq!(
            is_valid_email("first.last+tag@sub.example.org").unwrap(),
            "first.last+tag@sub.example.org"
        );
    }

    #[test]
    fn invalid_emails_are_rejected() {
        let invalid = vec![
            "",
            "   ",
            "notanemail",
            "user@",
            "@example.com",
            "user@@example.com",
            "user..name@example.com",
            "user name@example.com",
        ];

        for email in invalid {
            assert!(is_valid_email(email).is_err(), "should reject {:?}", email);
        }
    }

    #[test]
    fn overlong_email_is_rejected() {
        let local = "a".repeat(MAX_LOCAL_PART_LENGTH + 1);
        assert!(is_valid_email(&format!("{}@example.com", local)).is_err());

        let domain = format!("{}.com", "b".repeat(MAX_EMAIL_LENGTH));
        assert!(matches!(
            is_valid_email(&format!("a@{}", domain)),
            Err(ValidationError::TooLong(_, _))
        ));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(is_valid_name("name", "  MacBook Pro ").unwrap(), "MacBook Pro");
        assert!(matches!(
            is_valid_name("name", "x"),
            Err(ValidationError::TooShort(_, 2))
        ));
        assert!(matches!(
            is_valid_name("name", "   "),
            Err(ValidationError::EmptyField(_))
        ));
        assert!(is_valid_name("name", &"n".repeat(MAX_NAME_LENGTH + 1)).is_err());
        assert!(is_valid_name("name", "bad\u{0007}name").is_err());
    }
}
