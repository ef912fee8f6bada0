//! Category domain model.
//!
//! A category is a named grouping owned by one user. Names are expected to
//! be unique per user but no hard constraint enforces it.

use super::{require_text, UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Store-assigned category identifier.
pub type CategoryId = i64;

/// Persisted category record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
}

impl Category {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("user_id", &self.user_id)?;
        require_text("name", &self.name)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Data required to insert a new [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub user_id: UserId,
    pub name: String,
}

impl NewCategory {
    /// Builds an insert request with the name trimmed.
    pub fn new(user_id: impl Into<UserId>, name: &str) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("user_id", &self.user_id)?;
        require_text("name", &self.name)
    }
}
