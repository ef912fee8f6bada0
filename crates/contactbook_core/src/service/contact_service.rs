//! Contact use-case service.
//!
//! # Responsibility
//! - Provide create/update/get/delete and owner-scoped list/search APIs.
//! - Read back written rows so callers always see store-assigned fields.
//!
//! # Invariants
//! - Lists are sorted by last name, first name, then id.
//! - Deleting a contact removes it from every category.

use crate::model::category::CategoryId;
use crate::model::contact::{Contact, ContactId, NewContact};
use crate::repo::contact_repo::{ContactListQuery, ContactRepository};
use crate::repo::{EntityRef, RepoError, RepoResult};
use log::info;

/// Contact service facade over repository implementations.
pub struct ContactService<R: ContactRepository> {
    repo: R,
}

impl<R: ContactRepository> ContactService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a contact and returns the stored record.
    pub fn create_contact(&self, contact: &NewContact) -> RepoResult<Contact> {
        let id = self.repo.create_contact(contact)?;
        info!("event=contact_create module=contact status=ok contact_id={id}");
        self.get_contact(id)
    }

    /// Replaces editable fields of an existing contact.
    pub fn update_contact(&self, contact: &Contact) -> RepoResult<Contact> {
        self.repo.update_contact(contact)?;
        self.get_contact(contact.id)
    }

    /// Gets one contact, failing with `NotFound` when absent.
    pub fn get_contact(&self, id: ContactId) -> RepoResult<Contact> {
        self.repo
            .get_contact(id)?
            .ok_or(RepoError::NotFound(EntityRef::Contact(id)))
    }

    /// Deletes a contact and, by cascade, all its memberships.
    pub fn delete_contact(&self, id: ContactId) -> RepoResult<()> {
        self.repo.delete_contact(id)?;
        info!("event=contact_delete module=contact status=ok contact_id={id}");
        Ok(())
    }

    /// Lists a user's contacts, optionally only members of one category.
    pub fn list_contacts(
        &self,
        user_id: &str,
        category_id: Option<CategoryId>,
    ) -> RepoResult<Vec<Contact>> {
        let query = ContactListQuery {
            category_id,
            ..ContactListQuery::for_user(user_id)
        };
        self.repo.list_contacts(&query)
    }

    /// Case-insensitive full-name search; a blank term lists everything.
    pub fn search_contacts(&self, user_id: &str, term: &str) -> RepoResult<Vec<Contact>> {
        let term = term.trim();
        let query = ContactListQuery {
            name_contains: (!term.is_empty()).then(|| term.to_string()),
            ..ContactListQuery::for_user(user_id)
        };
        self.repo.list_contacts(&query)
    }
}
