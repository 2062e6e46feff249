/// Input validators
///
/// The one piece of input checking the HTTP surface performs: email
/// shape. Everything else (password policy, payload schemas) belongs to
/// upstream clients.

use lazy_static::lazy_static;
use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validate and normalize an email address.
pub fn is_valid_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LENGTH {
        return None;
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return None;
    }
    Some(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert_eq!(
            is_valid_email("user@example.com"),
            Some("user@example.com".to_string())
        );
        assert_eq!(
            is_valid_email("  First.Last+tag@sub.Example.org "),
            Some("first.last+tag@sub.example.org".to_string())
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "notanemail", "user@", "@example.com", "user@@example.com"] {
            assert!(is_valid_email(bad).is_none(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn rejects_overlong_addresses() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&long).is_none());
    }
}
