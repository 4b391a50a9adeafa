//! Client-side validation of the registration form.
//!
//! Runs before any request is issued; the authority re-validates on its side.

use serde::Serialize;
use thiserror::Error;

use warden_core::FieldError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const EMAIL_MIN: usize = 5;
pub const EMAIL_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 128;

/// Registration form as entered by the user.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Payload sent to `POST /auth/register` once the form validates.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// All field-level problems found in a form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RegistrationForm {
    /// Validate every field, collecting all problems.
    pub fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = Vec::new();

        let username = self.username.trim().to_string();
        let username_len = username.chars().count();
        if username_len < USERNAME_MIN {
            errors.push(FieldError::new(
                "username",
                format!("must be at least {USERNAME_MIN} characters"),
            ));
        } else if username_len > USERNAME_MAX {
            errors.push(FieldError::new(
                "username",
                format!("must be at most {USERNAME_MAX} characters"),
            ));
        }

        let email = self.email.trim().to_string();
        let email_len = email.chars().count();
        if !(EMAIL_MIN..=EMAIL_MAX).contains(&email_len) {
            errors.push(FieldError::new(
                "email",
                format!("must be between {EMAIL_MIN} and {EMAIL_MAX} characters"),
            ));
        } else if !is_valid_email(&email) {
            errors.push(FieldError::new("email", "is not a valid email address"));
        }

        let password_len = self.password.chars().count();
        if password_len < PASSWORD_MIN {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {PASSWORD_MIN} characters"),
            ));
        } else if password_len > PASSWORD_MAX {
            errors.push(FieldError::new(
                "password",
                format!("must be at most {PASSWORD_MAX} characters"),
            ));
        }

        if self.password != self.confirm_password {
            errors.push(FieldError::new("confirm_password", "passwords do not match"));
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        Ok(Registration {
            username,
            email,
            password: self.password,
        })
    }
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn valid_form_passes() {
        let reg = form(" frank ", "frank@example.com", "hunter22", "hunter22")
            .validate()
            .unwrap();
        assert_eq!(reg.username, "frank");
    }

    #[test]
    fn two_character_username_is_rejected() {
        let err = form("fr", "frank@example.com", "hunter22", "hunter22")
            .validate()
            .unwrap_err();
        assert!(err.for_field("username").is_some());
        assert_eq!(err.fields().len(), 1);
    }

    #[test]
    fn all_problems_are_reported_together() {
        let err = form("ab", "not-an-email", "123", "321").validate().unwrap_err();
        let fields: Vec<&str> = err.fields().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["username", "email", "password", "confirm_password"]);
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email("a@b..io"));
    }
}
