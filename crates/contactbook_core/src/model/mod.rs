//! Domain model for contacts, categories and their owners.
//!
//! # Responsibility
//! - Define the records persisted by the repository layer.
//! - Own field-level validation shared by every write and read-back path.
//!
//! # Invariants
//! - Every contact and category carries the id of the user that owns it.
//! - Membership is not modeled on either record; it lives only in the
//!   `category_contacts` relation and is projected by queries.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category;
pub mod contact;

/// Identity principal owning contacts and categories.
pub type UserId = String;

/// Field-level validation failure for contact/category records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Image payload present without bytes or without a MIME type.
    IncompleteImage,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::IncompleteImage => {
                write!(f, "contact image requires both bytes and a mime type")
            }
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankField(field))
    } else {
        Ok(())
    }
}
