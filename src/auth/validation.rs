//! Form schemas, checked before any remote call.

use std::fmt;

use crate::backend::FileUpload;
use crate::models::{Credentials, NewPost, NewUser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn for_field(&self, field: &str) -> impl Iterator<Item = &str> {
        let field = field.to_string();
        self.0
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    fn check_length(&mut self, field: &'static str, value: &str, min: usize, max: Option<usize>) {
        let len = value.chars().count();
        if len < min {
            self.add(
                field,
                format!("String must contain at least {} character(s)", min),
            );
        } else if let Some(max) = max.filter(|max| len > *max) {
            self.add(
                field,
                format!("String must contain at most {} character(s)", max),
            );
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
        && !email.chars().any(char::is_whitespace)
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < 8 {
        errors.add("password", "Password must be at least 8 characters");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email) {
        errors.add("email", "Invalid email");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.chars().count() < 2 {
            errors.add("name", "Too short");
        }
        errors.check_length("username", &self.username, 2, Some(50));
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);

        errors.into_result(NewUser {
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigninForm {
    pub email: String,
    pub password: String,
}

impl SigninForm {
    pub fn validate(&self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);

        errors.into_result(Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostForm {
    pub caption: String,
    pub files: Vec<FileUpload>,
    pub location: String,
    pub tags: String,
}

impl PostForm {
    pub fn validate(&self, creator: &str) -> Result<NewPost, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let caption_len = self.caption.chars().count();
        if caption_len < 5 {
            errors.add("caption", "Minimum 5 characters.");
        } else if caption_len > 2200 {
            errors.add("caption", "Maximum 2,200 characters.");
        }

        let location_len = self.location.chars().count();
        if location_len < 1 {
            errors.add("location", "This field is required.");
        } else if location_len > 1000 {
            errors.add("location", "Maximum 1000 characters.");
        }

        let Some(file) = self.files.first() else {
            errors.add("file", "An image is required.");
            return Err(errors);
        };

        errors.into_result(NewPost {
            creator: creator.to_string(),
            caption: self.caption.clone(),
            file: file.clone(),
            location: self.location.clone(),
            tags: self.tags.clone(),
        })
    }
}
