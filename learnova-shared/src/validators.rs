//! Field format validators
//!
//! String validators plug into `#[validate(custom(function = "..."))]` on
//! request payloads. Empty strings pass every format check; presence is
//! enforced separately by `length(min = 1)` where a field is required.
//!
//! The numeric checks take values by copy and are applied by the handlers,
//! which add their errors to the payload's `ValidationErrors`.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("EMAIL_REGEX: invalid regex pattern")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[\d\s\-()]{10,20}$").expect("PHONE_REGEX: invalid regex pattern")
});

static SLUG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("SLUG_REGEX: invalid regex pattern")
});

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._]+$").expect("USERNAME_REGEX: invalid regex pattern")
});

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const QUIZ_TIME_LIMIT_MAX_MINUTES: i32 = 480;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_email_format(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || EMAIL_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid("email", "Enter a valid email address."))
    }
}

pub fn validate_phone_format(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || PHONE_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid("phone", "Enter a valid phone number."))
    }
}

pub fn validate_slug_format(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || SLUG_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "slug",
            "Slug must be lowercase with hyphens only (e.g., my-course-name).",
        ))
    }
}

pub fn validate_username_format(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    if !USERNAME_REGEX.is_match(value) {
        return Err(invalid(
            "username",
            "Username can only contain letters, numbers, dots, and underscores.",
        ));
    }
    if value.chars().count() < USERNAME_MIN_LENGTH {
        return Err(invalid("username", "Username must be at least 3 characters."));
    }
    Ok(())
}

pub fn validate_percentage(value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        Err(invalid("percentage", "Percentage must be between 0 and 100."))
    } else {
        Ok(())
    }
}

pub fn validate_quiz_time_limit(minutes: i32) -> Result<(), ValidationError> {
    if (1..=QUIZ_TIME_LIMIT_MAX_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(invalid(
            "time_limit",
            "Time limit must be between 1 and 480 minutes (8 hours).",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_email() {
        assert!(validate_email_format("ada@learnova.io").is_ok());
        assert!(validate_email_format("first.last+tag@school.co.in").is_ok());
        assert!(validate_email_format("").is_ok());
        assert!(validate_email_format("no-at-sign").is_err());
        assert!(validate_email_format("a@b.c").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone_format("+91 98765 43210").is_ok());
        assert!(validate_phone_format("(555) 123-4567").is_ok());
        assert!(validate_phone_format("").is_ok());
        assert!(validate_phone_format("12345").is_err());
        assert!(validate_phone_format("phone-number").is_err());
    }

    #[test]
    fn test_slug() {
        assert!(validate_slug_format("intro-to-rust").is_ok());
        assert!(validate_slug_format("class10").is_ok());
        assert!(validate_slug_format("Intro").is_err());
        assert!(validate_slug_format("double--hyphen").is_err());
        assert!(validate_slug_format("-leading").is_err());
        assert!(validate_slug_format("under_score").is_err());
    }

    #[test]
    fn test_username() {
        assert!(validate_username_format("ada.l_1").is_ok());
        let short = validate_username_format("ab").unwrap_err();
        assert_eq!(short.message.as_deref(), Some("Username must be at least 3 characters."));
        assert!(validate_username_format("has space").is_err());
        assert!(validate_username_format("dash-name").is_err());
    }

    #[test]
    fn test_percentage() {
        assert!(validate_percentage(dec("0")).is_ok());
        assert!(validate_percentage(dec("100.00")).is_ok());
        assert!(validate_percentage(dec("55.5")).is_ok());
        assert!(validate_percentage(dec("100.01")).is_err());
        assert!(validate_percentage(dec("-1")).is_err());
    }

    #[test]
    fn test_quiz_time_limit() {
        assert!(validate_quiz_time_limit(1).is_ok());
        assert!(validate_quiz_time_limit(480).is_ok());
        assert!(validate_quiz_time_limit(0).is_err());
        assert!(validate_quiz_time_limit(481).is_err());
    }
}
