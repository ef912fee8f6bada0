//! Contact domain model.
//!
//! # Responsibility
//! - Define the person record owned by one user.
//! - Validate required fields, email shape and image completeness.
//!
//! # Invariants
//! - `id` and `created_at` are assigned by the store and never change.
//! - `user_id` is immutable after insert.
//! - `image` is either absent or carries both bytes and a MIME type.

use super::{require_text, UserId, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Store-assigned contact identifier.
pub type ContactId = i64;

/// Binary avatar payload attached to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactImage {
    /// Raw image bytes. Never serialized.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// MIME type such as `image/png`.
    pub mime_type: String,
}

impl ContactImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// Persisted contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    /// Creation instant, UTC, millisecond precision.
    pub created_at: DateTime<Utc>,
    /// Serialized as MIME metadata only; always `None` after deserialization.
    #[serde(skip_deserializing)]
    pub image: Option<ContactImage>,
}

impl Contact {
    /// Display name used for search and listing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.user_id,
            &self.first_name,
            &self.last_name,
            &self.email,
            self.image.as_ref(),
        )
    }
}

/// Data required to insert a new [`Contact`].
///
/// Build with [`NewContact::new`] and fill optional fields directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    #[serde(skip_deserializing)]
    pub image: Option<ContactImage>,
}

impl NewContact {
    /// Creates an insert request with required fields; optional fields start empty.
    pub fn new(
        user_id: impl Into<UserId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date: None,
            address1: None,
            address2: None,
            city: None,
            state: None,
            zip_code: None,
            email: email.into(),
            phone_number: None,
            image: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.user_id,
            &self.first_name,
            &self.last_name,
            &self.email,
            self.image.as_ref(),
        )
    }
}

fn validate_fields(
    user_id: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
    image: Option<&ContactImage>,
) -> Result<(), ValidationError> {
    require_text("user_id", user_id)?;
    require_text("first_name", first_name)?;
    require_text("last_name", last_name)?;
    require_text("email", email)?;
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    if let Some(image) = image {
        if image.data.is_empty() || image.mime_type.trim().is_empty() {
            return Err(ValidationError::IncompleteImage);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ContactImage, NewContact};
    use crate::model::ValidationError;

    #[test]
    fn email_shape_is_checked() {
        let mut draft = NewContact::new("u1", "Ada", "Lovelace", "ada@example.com");
        assert!(draft.validate().is_ok());

        draft.email = "ada.example.com".to_string();
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn image_requires_bytes_and_mime_type() {
        let mut draft = NewContact::new("u1", "Ada", "Lovelace", "ada@example.com");
        draft.image = Some(ContactImage::new(Vec::new(), "image/png"));
        assert_eq!(draft.validate(), Err(ValidationError::IncompleteImage));

        draft.image = Some(ContactImage::new(vec![1, 2, 3], " "));
        assert_eq!(draft.validate(), Err(ValidationError::IncompleteImage));
    }
}
