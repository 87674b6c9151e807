use regex::Regex;
use std::sync::OnceLock;

use crate::error::AppError;

pub const MAX_EMAIL_LEN: usize = 100;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z0-9-]+$";

fn email_regex() -> Result<&'static Regex, AppError> {
    static EMAIL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN))
        .as_ref()
        .map_err(|e| AppError::InternalError(format!("error compiling email regex: {}", e)))
}

/// Syntactic email check; no DNS or MX lookups.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(AppError::ValidationError(format!(
            "email too long (max {} characters)",
            MAX_EMAIL_LEN
        )));
    }

    if !email_regex()?.is_match(email) {
        return Err(AppError::ValidationError("email not valid".into()));
    }

    Ok(())
}
