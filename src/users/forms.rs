use axum::extract::Multipart;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;
use crate::users::repo_types::Role;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A file part received alongside the form fields.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub body: Bytes,
}

/// Raw multipart fields; everything optional so the same collector serves
/// registration, admin create and admin partial update.
#[derive(Debug, Clone, Default)]
pub struct UserFormFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub mobile_number: Option<String>,
    pub role: Option<Role>,
}

/// Validated registration payload. This is also what the OTP registry holds
/// for a pending registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub mobile_number: Option<String>,
    pub role: Role,
}

impl UserFormFields {
    /// Promote to a full registration form. Normalizes the email to
    /// lowercase and rejects missing/malformed required fields.
    pub fn into_register_form(self) -> Result<RegisterForm, ApiError> {
        let first_name = require(self.first_name, "first_name")?;
        let last_name = require(self.last_name, "last_name")?;
        let email = require(self.email, "email")?.trim().to_lowercase();
        let password = require(self.password, "password")?;

        if !is_valid_email(&email) {
            return Err(ApiError::Validation("invalid email".into()));
        }
        if password.len() < 8 {
            return Err(ApiError::Validation("password too short".into()));
        }

        Ok(RegisterForm {
            first_name,
            last_name,
            email,
            password,
            mobile_number: self.mobile_number,
            role: self.role.unwrap_or(Role::User),
        })
    }
}

fn require(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("missing field: {name}"))),
    }
}

/// Drain a multipart body into form fields plus an optional `profile_pic`
/// file. Unknown fields are ignored.
pub async fn collect_user_form(
    multipart: &mut Multipart,
) -> Result<(UserFormFields, Option<UploadedFile>), ApiError> {
    let mut fields = UserFormFields::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "profile_pic" => {
                let filename = field.file_name().map(str::to_string);
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("failed to read file: {e}")))?;
                if let Some(filename) = filename {
                    if !body.is_empty() {
                        file = Some(UploadedFile { filename, body });
                    }
                }
            }
            "first_name" => fields.first_name = Some(text(field).await?),
            "last_name" => fields.last_name = Some(text(field).await?),
            "email" => fields.email = Some(text(field).await?),
            "password" => fields.password = Some(text(field).await?),
            "mobile_number" => fields.mobile_number = Some(text(field).await?),
            "role" => {
                let raw = text(field).await?;
                let role = raw
                    .parse::<Role>()
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                fields.role = Some(role);
            }
            _ => {}
        }
    }

    Ok((fields, file))
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> UserFormFields {
        UserFormFields {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("Ada@Example.COM".into()),
            password: Some("longenough".into()),
            mobile_number: None,
            role: None,
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@nodot"));
    }

    #[test]
    fn register_form_lowercases_email_and_defaults_role() {
        let form = filled().into_register_form().unwrap();
        assert_eq!(form.email, "ada@example.com");
        assert_eq!(form.role, Role::User);
    }

    #[test]
    fn register_form_rejects_missing_fields() {
        let mut fields = filled();
        fields.last_name = None;
        let err = fields.into_register_form().unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(err.to_string().contains("last_name"));
    }

    #[test]
    fn register_form_rejects_short_password() {
        let mut fields = filled();
        fields.password = Some("short".into());
        let err = fields.into_register_form().unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn register_form_rejects_bad_email() {
        let mut fields = filled();
        fields.email = Some("nope".into());
        assert!(fields.into_register_form().is_err());
    }
}
