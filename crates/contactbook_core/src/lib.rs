//! Core domain logic for the contact book.
//!
//! Owns contacts, categories and the many-to-many membership between them:
//! ownership-aware linking, owner-scoped projections and atomic bulk
//! replacement of a contact's category set.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::category::{Category, CategoryId, NewCategory};
pub use model::contact::{Contact, ContactId, ContactImage, NewContact};
pub use model::{UserId, ValidationError};
pub use repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
pub use repo::contact_repo::{ContactListQuery, ContactRepository, SqliteContactRepository};
pub use repo::membership_repo::{RelationshipStore, SqliteRelationshipStore};
pub use repo::{EntityRef, RepoError, RepoResult};
pub use service::category_service::CategoryService;
pub use service::contact_service::ContactService;
pub use service::membership_service::{
    LinkOutcome, MembershipError, MembershipResult, MembershipService, ReplaceSummary,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns the newest schema version this build can open.
pub fn schema_version() -> u32 {
    db::migrations::latest_version()
}
