use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};

/// Maximum accepted email length, after normalization.
const MAX_EMAIL_LEN: usize = 100;
/// Maximum accepted length for first and last names.
const MAX_NAME_LEN: usize = 255;
/// Longest password we are willing to hash.
const MAX_PASSWORD_LEN: usize = 128;

/// Symbols that count towards the "special character" class.
const SPECIAL_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?\\";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

/// Coarse password strength classes.
///
/// This is a character-class heuristic, not an entropy estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

/// Scores a password from 0 to 6.
///
/// One point each for: at least 8 characters, at least 12 characters, an
/// ASCII uppercase letter, an ASCII lowercase letter, a digit, a symbol.
pub fn password_score(password: &str) -> u8 {
    let length = password.chars().count();
    let checks = [
        length >= 8,
        length >= 12,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| SPECIAL_SYMBOLS.contains(c)),
    ];
    checks.iter().filter(|&&hit| hit).count() as u8
}

/// Maps a password onto its strength class.
pub fn evaluate_password_strength(password: &str) -> PasswordStrength {
    match password_score(password) {
        0..=2 => PasswordStrength::Weak,
        3..=4 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}

/// Validates a password chosen at registration.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is acceptable.
pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }

    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    if evaluate_password_strength(password) == PasswordStrength::Weak {
        return Err(AppError::Validation(
            "Password is too weak. Use a combination of uppercase, lowercase, numbers, and symbols"
                .to_string(),
        ));
    }

    Ok(())
}

/// Trims a first or last name and checks it is present.
pub fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(
            "Name must be at most 255 characters".to_string(),
        ));
    }

    Ok(name.to_string())
}

/// Trims, lowercases and strips one pair of enclosing angle brackets.
///
/// No format checks. Used on login, where a format error would tell the
/// caller more than "invalid credentials" does.
pub fn canonical_email(email: &str) -> String {
    let email = email.trim().to_lowercase();
    let email = email.strip_prefix('<').unwrap_or(email.as_str());
    let email = email.strip_suffix('>').unwrap_or(email);
    email.to_string()
}

/// Normalizes an email address and checks it looks like `local@domain.tld`.
///
/// Intentionally simple; not RFC 5322.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = canonical_email(email);

    if email.is_empty() {
        return Err(AppError::Validation("Email cannot be empty".to_string()));
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(AppError::Validation(
            "Email cannot be longer than 100 characters".to_string(),
        ));
    }

    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    Ok(email)
}
