//! Form validation shared by the services
//!
//! Every check here runs before any store call is made.

use crate::error::{AppError, AuthError, Result};

/// Filter values meaning "no filter"
const ALL: &str = "all";

/// A dropdown selection, with empty and "all" meaning unfiltered
pub fn selected(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ALL))
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn require_min_len(field: &str, value: &str, min: usize) -> Result<()> {
    if value.trim().chars().count() < min {
        return Err(AppError::validation(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    Ok(())
}

pub fn require_range(field: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if value < min || value > max {
        return Err(AppError::validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

/// Logins are email addresses: one `@`, a non-empty local part and a
/// dotted domain, no whitespace.
pub fn validate_login(login: &str) -> std::result::Result<(), AuthError> {
    let malformed = || AuthError::MalformedIdentifier(login.to_string());

    if login.chars().any(char::is_whitespace) {
        return Err(malformed());
    }

    let (local, domain) = login.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') {
        return Err(malformed());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(malformed());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_logins() {
        assert!(validate_login("asha@college.edu").is_ok());
        assert!(validate_login("first.last+tag@mail.example.in").is_ok());
    }

    #[test]
    fn test_malformed_logins() {
        for login in [
            "",
            "admin",
            "@college.edu",
            "asha@",
            "asha@college",
            "asha@college.",
            "a@b@c.edu",
            "asha @college.edu",
        ] {
            assert_eq!(
                validate_login(login),
                Err(AuthError::MalformedIdentifier(login.to_string())),
                "expected {:?} to be rejected",
                login
            );
        }
    }

    #[test]
    fn test_selected_treats_all_as_unfiltered() {
        assert_eq!(selected(None), None);
        assert_eq!(selected(Some("".into())), None);
        assert_eq!(selected(Some("all".into())), None);
        assert_eq!(selected(Some(" ALL ".into())), None);
        assert_eq!(selected(Some(" CSE ".into())), Some("CSE".to_string()));
    }

    #[test]
    fn test_field_checks() {
        assert!(require_non_empty("Batch", "2022-26").is_ok());
        assert!(require_non_empty("Batch", "   ").is_err());
        assert!(require_min_len("Name", "Al", 2).is_ok());
        assert!(require_min_len("Name", " A ", 2).is_err());
        assert!(require_range("Year", 4, 1, 4).is_ok());
        assert!(require_range("Year", 5, 1, 4).is_err());
        assert!(require_range("Year", 0, 1, 4).is_err());
    }
}
