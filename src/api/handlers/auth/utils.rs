//! Field validators and password hashing for the auth endpoints.
//!
//! Validation is explicit: each endpoint runs its validator before the
//! authentication service is invoked and gets back one entry per offending
//! field. The stored password is an argon2 hash, never the plaintext.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use regex::Regex;

use super::types::{LoginRequest, RegisterRequest};
use crate::api::error::FieldError;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_]{3,30}$").is_ok_and(|regex| regex.is_match(username))
}

fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^[0-9+()\-\s]{7,20}$").is_ok_and(|regex| regex.is_match(phone))
}

fn valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.len() <= 50
}

/// Validate a registration payload, returning one entry per offending field.
pub(crate) fn validate_register(request: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !valid_email(&normalize_email(&request.email)) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
    if !valid_username(&request.username) {
        errors.push(FieldError::new(
            "username",
            "must be 3-30 characters: letters, digits or underscore",
        ));
    }
    if request.password.len() < 8 || request.password.len() > 128 {
        errors.push(FieldError::new(
            "password",
            "must be between 8 and 128 characters",
        ));
    }
    if !valid_name(&request.first_name) {
        errors.push(FieldError::new(
            "first_name",
            "must be between 1 and 50 characters",
        ));
    }
    if !valid_name(&request.last_name) {
        errors.push(FieldError::new(
            "last_name",
            "must be between 1 and 50 characters",
        ));
    }
    if !valid_phone(&request.phone) {
        errors.push(FieldError::new(
            "phone",
            "must be 7-20 characters: digits, spaces or + ( ) -",
        ));
    }
    errors
}

/// Validate a login payload. Only presence is checked here; credential
/// verification happens against the stored hash.
pub(crate) fn validate_login(request: &LoginRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if request.username.trim().is_empty() {
        errors.push(FieldError::new("username", "must not be blank"));
    }
    if request.password.is_empty() {
        errors.push(FieldError::new("password", "must not be blank"));
    }
    errors
}

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns an error if argon2 rejects the input.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("{err}"))
        .context("failed to hash password")?;
    Ok(hash.to_string())
}

/// Compare a candidate password against a stored hash.
/// Unparseable hashes count as a mismatch so login stays uniform.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password: "correct horse".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            phone: "+1 555 0100".to_string(),
        }
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn validate_register_accepts_well_formed_payload() {
        assert!(validate_register(&register_request()).is_empty());
    }

    #[test]
    fn validate_register_reports_each_offending_field() {
        let request = RegisterRequest {
            email: "nope".to_string(),
            username: "x".to_string(),
            password: "short".to_string(),
            first_name: String::new(),
            last_name: "Doe".to_string(),
            phone: "abc".to_string(),
        };
        let errors = validate_register(&request);
        let fields: Vec<&str> = errors.iter().map(|error| error.field).collect();
        assert_eq!(
            fields,
            vec!["email", "username", "password", "first_name", "phone"]
        );
    }

    #[test]
    fn validate_login_requires_both_fields() {
        let request = LoginRequest {
            username: " ".to_string(),
            password: String::new(),
        };
        let errors = validate_login(&request);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn password_hash_round_trip() -> Result<()> {
        let hash = hash_password("correct horse")?;
        assert_ne!(hash, "correct horse");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        Ok(())
    }

    #[test]
    fn verify_password_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
