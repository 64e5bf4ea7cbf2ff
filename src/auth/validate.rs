use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::auth::dto::{
    ForgotPasswordRequest, LoginRequest, PasswordUpdateRequest, ProfileUpdateRequest,
    RegisterRequest, ResetPasswordRequest,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{11}$").unwrap();
}

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;

/// Field name -> messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    let len = name.chars().count();
    if len == 0 {
        errors.add("name", "Name is required");
    } else if len < NAME_MIN {
        errors.add("name", "Name must be at least 3 characters");
    } else if len > NAME_MAX {
        errors.add("name", "Name must not exceed 50 characters");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Email must be a valid email address");
    }
}

fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    if phone.is_empty() {
        errors.add("phone_number", "Phone number is required");
    } else if !PHONE_RE.is_match(phone) {
        errors.add("phone_number", "Phone number must be 11 digits");
    }
}

/// `label` is the human name used in messages, e.g. "New password".
fn check_new_password(
    errors: &mut ValidationErrors,
    field: &'static str,
    label: &str,
    password: &str,
    confirmation: Option<&str>,
) {
    if password.is_empty() {
        errors.add(field, format!("{label} is required"));
        return;
    }
    if password.chars().count() < PASSWORD_MIN {
        errors.add(field, format!("{label} must be at least 8 characters"));
    }
    if let Some(confirmation) = confirmation {
        if confirmation != password {
            errors.add(field, format!("{label} confirmation does not match"));
        }
    }
}

fn check_required(errors: &mut ValidationErrors, field: &'static str, label: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, format!("{label} is required"));
    }
}

pub fn register(input: &RegisterRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_name(&mut errors, &input.name);
    check_email(&mut errors, &input.email);
    check_new_password(
        &mut errors,
        "password",
        "Password",
        &input.password,
        Some(&input.password_confirmation),
    );
    check_phone(&mut errors, &input.phone_number);
    errors.into_result()
}

pub fn login(input: &LoginRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(&mut errors, &input.email);
    check_required(&mut errors, "password", "Password", &input.password);
    errors.into_result()
}

pub fn profile_update(input: &ProfileUpdateRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_name(&mut errors, &input.name);
    check_email(&mut errors, &input.email);
    errors.into_result()
}

pub fn password_update(input: &PasswordUpdateRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_required(&mut errors, "old_password", "Old password", &input.old_password);
    check_new_password(
        &mut errors,
        "new_password",
        "New password",
        &input.new_password,
        None,
    );
    errors.into_result()
}

pub fn forgot_password(input: &ForgotPasswordRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(&mut errors, &input.email);
    errors.into_result()
}

pub fn reset_password(input: &ResetPasswordRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_email(&mut errors, &input.email);
    check_required(&mut errors, "token", "Token", &input.token);
    check_new_password(
        &mut errors,
        "password",
        "Password",
        &input.password,
        Some(&input.password_confirmation),
    );
    errors.into_result()
}
