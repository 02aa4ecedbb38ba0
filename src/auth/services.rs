use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::dto::{LoginRequest, RegisterRequest},
    error::{ApiError, Validator},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes the email in place and checks both fields.
pub(crate) fn validate_registration(
    payload: &mut RegisterRequest,
    password_min_length: usize,
) -> Result<(), ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut v = Validator::new();
    if !is_valid_email(&payload.email) {
        v.add("email", "Invalid email");
    }
    if payload.password.chars().count() < password_min_length {
        v.add(
            "password",
            format!("Password must be at least {password_min_length} characters"),
        );
    }
    v.finish()
}

/// Only shape is checked here; the password policy is not revealed at login.
pub(crate) fn validate_login(payload: &mut LoginRequest) -> Result<(), ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut v = Validator::new();
    if !is_valid_email(&payload.email) {
        v.add("email", "Invalid email");
    }
    if payload.password.is_empty() {
        v.add("password", "Password is required");
    }
    v.finish()
}
