use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const NAME_MAX_LEN: usize = 50;
const EMAIL_MAX_LEN: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trim and syntax-check an email. Case is preserved: addresses are stored
/// and matched exactly as given.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if email.len() > EMAIL_MAX_LEN || !is_valid_email(email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(email.to_string())
}

pub fn normalize_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".into()));
    }
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(username.to_string())
}

/// Blank names count as absent.
pub fn normalize_name(field: &str, raw: Option<String>) -> AppResult<Option<String>> {
    let Some(raw) = raw else { return Ok(None) };
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(Some(name.to_string()))
}

/// Tokens arrive from links and forms; an empty one can never match.
pub fn require_token(raw: &str) -> AppResult<&str> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(AppError::Validation("token is required".into()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_but_case_preserved() {
        assert_eq!(normalize_email("  Alice@Example.com ").unwrap(), "Alice@Example.com");
    }

    #[test]
    fn email_rejects_garbage() {
        for bad in ["", "   ", "alice", "alice@", "@example.com", "a b@x.com", "a@x"] {
            assert!(normalize_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn username_length_and_charset() {
        assert!(normalize_username("al").is_err());
        assert!(normalize_username("alice").is_ok());
        assert!(normalize_username(&"a".repeat(50)).is_ok());
        assert!(normalize_username(&"a".repeat(51)).is_err());
        assert!(normalize_username("al ice").is_err());
        assert_eq!(normalize_username(" bob.smith ").unwrap(), "bob.smith");
    }

    #[test]
    fn names_are_optional_and_bounded() {
        assert_eq!(normalize_name("first_name", None).unwrap(), None);
        assert_eq!(normalize_name("first_name", Some("  ".into())).unwrap(), None);
        assert_eq!(
            normalize_name("first_name", Some(" Ada ".into())).unwrap(),
            Some("Ada".into())
        );
        let err = normalize_name("last_name", Some("x".repeat(51))).unwrap_err();
        assert!(err.to_string().starts_with("last_name"));
    }

    #[test]
    fn empty_token_is_a_validation_error() {
        assert!(matches!(require_token("  "), Err(AppError::Validation(_))));
        assert_eq!(require_token(" abc ").unwrap(), "abc");
    }
}
