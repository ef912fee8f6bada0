//! Membership use-case service.
//!
//! # Responsibility
//! - Policy layer over [`RelationshipStore`]: idempotent link/unlink,
//!   existence checks, owner-scoped projections and bulk category resync.
//! - Apply deterministic ordering to store sequences.
//!
//! # Invariants
//! - Missing contacts/categories inside link/unlink are a logged no-op
//!   (`LinkOutcome::MissingEntity`), never an error.
//! - A contact and a category owned by different users are never linked.
//! - `replace_contact_categories` commits once; on failure nothing it staged
//!   survives and the prior membership set is intact.
//! - In scoped mode, entities owned by another user behave as missing.
//!
//! # Contract
//! Unscoped services assume the caller already checked that the acting user
//! owns the ids passed in. Use [`MembershipService::scoped`] to have the
//! service verify ownership itself.

use crate::model::category::{Category, CategoryId};
use crate::model::contact::{Contact, ContactId};
use crate::model::UserId;
use crate::repo::membership_repo::RelationshipStore;
use crate::repo::{EntityRef, RepoError};
use log::{error, info, warn};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type MembershipResult<T> = Result<T, MembershipError>;

/// Errors surfaced by membership operations.
#[derive(Debug)]
pub enum MembershipError {
    /// Referenced contact/category does not exist (or is outside the scope).
    NotFound(EntityRef),
    /// Contact and category belong to different users.
    OwnerMismatch {
        category_id: CategoryId,
        contact_id: ContactId,
    },
    /// Backing store failed to read or commit.
    Storage(RepoError),
}

impl Display for MembershipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::OwnerMismatch {
                category_id,
                contact_id,
            } => write!(
                f,
                "category {category_id} and contact {contact_id} belong to different users"
            ),
            Self::Storage(err) => write!(f, "membership storage failure: {err}"),
        }
    }
}

impl Error for MembershipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MembershipError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Storage(other),
        }
    }
}

/// Observable result of a single link/unlink call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new membership was committed.
    Linked,
    /// The pair was already linked; nothing changed.
    AlreadyLinked,
    /// An existing membership was removed.
    Unlinked,
    /// The pair was not linked; nothing changed.
    NotLinked,
    /// Contact or category is missing; nothing changed.
    MissingEntity,
}

impl LinkOutcome {
    /// Returns whether the call changed stored membership.
    pub fn changed(self) -> bool {
        matches!(self, Self::Linked | Self::Unlinked)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::AlreadyLinked => "already_linked",
            Self::Unlinked => "unlinked",
            Self::NotLinked => "not_linked",
            Self::MissingEntity => "missing_entity",
        }
    }
}

/// Counts reported by a completed bulk replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    /// Memberships dropped because they were not in the desired set.
    pub removed: usize,
    /// Memberships created from the desired set.
    pub added: usize,
    /// Desired ids ignored because the category is missing or out of scope.
    pub skipped: Vec<CategoryId>,
}

/// Membership service facade over a relationship store.
pub struct MembershipService<S: RelationshipStore> {
    store: S,
    scope: Option<UserId>,
}

impl<S: RelationshipStore> MembershipService<S> {
    /// Creates an unscoped service; ownership is a caller precondition.
    pub fn new(store: S) -> Self {
        Self { store, scope: None }
    }

    /// Creates a service acting on behalf of `user_id`.
    pub fn scoped(store: S, user_id: impl Into<UserId>) -> Self {
        Self {
            store,
            scope: Some(user_id.into()),
        }
    }

    /// Returns the acting user when the service is scoped.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Releases the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns whether `contact_id` is a member of `category_id`.
    ///
    /// Unknown ids yield `false`, not an error.
    pub fn is_linked(
        &self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<bool> {
        if self.scope.is_some()
            && (self.visible_category(category_id)?.is_none()
                || self.visible_contact(contact_id)?.is_none())
        {
            return Ok(false);
        }
        Ok(self.store.has_membership(category_id, contact_id)?)
    }

    /// Links a contact to a category and persists the change.
    ///
    /// Idempotent: an existing link yields `AlreadyLinked`.
    pub fn add_link(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<LinkOutcome> {
        let outcome = match self.stage_add(category_id, contact_id) {
            Ok(outcome) => outcome,
            Err(err) => return self.abandon(err),
        };
        self.commit()?;
        info!(
            "event=membership_add module=membership status=ok category_id={category_id} contact_id={contact_id} outcome={}",
            outcome.as_str()
        );
        Ok(outcome)
    }

    /// Unlinks a contact from a category and persists the change.
    ///
    /// Idempotent: a missing link yields `NotLinked`.
    pub fn remove_link(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<LinkOutcome> {
        let outcome = match self.stage_remove(category_id, contact_id) {
            Ok(outcome) => outcome,
            Err(err) => return self.abandon(err),
        };
        self.commit()?;
        info!(
            "event=membership_remove module=membership status=ok category_id={category_id} contact_id={contact_id} outcome={}",
            outcome.as_str()
        );
        Ok(outcome)
    }

    /// Returns every category the contact belongs to, sorted by name.
    pub fn categories_of(&self, contact_id: ContactId) -> MembershipResult<Vec<Category>> {
        self.require_contact(contact_id)?;
        let mut categories = self.store.categories_of_contact(contact_id)?;
        if let Some(user_id) = self.scope.as_deref() {
            categories.retain(|category| category.is_owned_by(user_id));
        }
        categories.sort_by(compare_categories);
        Ok(categories)
    }

    /// Returns the ids of [`Self::categories_of`], in the same order.
    pub fn category_ids_of(&self, contact_id: ContactId) -> MembershipResult<Vec<CategoryId>> {
        Ok(self
            .categories_of(contact_id)?
            .into_iter()
            .map(|category| category.id)
            .collect())
    }

    /// Returns every category owned by `user_id`, sorted by name
    /// (case-insensitive), then by id.
    pub fn categories_owned_by(&self, user_id: &str) -> MembershipResult<Vec<Category>> {
        if self.scope.as_deref().is_some_and(|scope| scope != user_id) {
            return Ok(Vec::new());
        }
        let mut categories = self.store.categories_of_user(user_id)?;
        categories.retain(|category| category.is_owned_by(user_id));
        categories.sort_by(compare_categories);
        Ok(categories)
    }

    /// Returns the members of a category sorted by last name, then first name.
    pub fn contacts_in(&self, category_id: CategoryId) -> MembershipResult<Vec<Contact>> {
        let category = self
            .visible_category(category_id)?
            .ok_or(MembershipError::NotFound(EntityRef::Category(category_id)))?;
        let mut contacts = self.store.contacts_of_category(category_id)?;
        contacts.retain(|contact| contact.user_id == category.user_id);
        contacts.sort_by(compare_contacts);
        Ok(contacts)
    }

    /// Replaces the contact's whole category set with `category_ids`.
    ///
    /// Links outside the desired set are removed first, then every desired
    /// id is linked; both phases run sequentially inside one unit of work.
    /// Duplicate ids collapse. Missing or out-of-scope category ids are
    /// skipped the same way `add_link` skips them.
    ///
    /// # Errors
    /// - `NotFound` when the contact does not exist.
    /// - `OwnerMismatch` when a desired category belongs to another user.
    /// - `Storage` when any read/write/commit fails.
    ///
    /// Exactly one of these is returned per failed call. On error the staged
    /// work is discarded and the prior set is kept; retrying with the same
    /// input is safe.
    pub fn replace_contact_categories(
        &mut self,
        contact_id: ContactId,
        category_ids: &[CategoryId],
    ) -> MembershipResult<ReplaceSummary> {
        let started_at = Instant::now();
        let current = self.categories_of(contact_id)?;
        let desired: BTreeSet<CategoryId> = category_ids.iter().copied().collect();

        let staged = self.stage_replace(contact_id, &current, &desired);
        let summary = match staged {
            Ok(summary) => summary,
            Err(err) => {
                error!(
                    "event=membership_replace module=membership status=error contact_id={contact_id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return self.abandon(err);
            }
        };
        self.commit()?;

        info!(
            "event=membership_replace module=membership status=ok contact_id={contact_id} removed={} added={} skipped={} duration_ms={}",
            summary.removed,
            summary.added,
            summary.skipped.len(),
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    fn stage_replace(
        &mut self,
        contact_id: ContactId,
        current: &[Category],
        desired: &BTreeSet<CategoryId>,
    ) -> MembershipResult<ReplaceSummary> {
        let mut summary = ReplaceSummary::default();

        for category in current.iter().filter(|c| !desired.contains(&c.id)) {
            if self.stage_remove(category.id, contact_id)?.changed() {
                summary.removed += 1;
            }
        }

        for &category_id in desired {
            match self.stage_add(category_id, contact_id)? {
                LinkOutcome::Linked => summary.added += 1,
                LinkOutcome::MissingEntity => summary.skipped.push(category_id),
                _ => {}
            }
        }

        Ok(summary)
    }

    fn stage_add(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<LinkOutcome> {
        let Some((category, contact)) = self.resolve_pair(category_id, contact_id)? else {
            return Ok(LinkOutcome::MissingEntity);
        };
        if category.user_id != contact.user_id {
            return Err(MembershipError::OwnerMismatch {
                category_id,
                contact_id,
            });
        }
        if self.store.add_membership(category_id, contact_id)? {
            Ok(LinkOutcome::Linked)
        } else {
            Ok(LinkOutcome::AlreadyLinked)
        }
    }

    fn stage_remove(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<LinkOutcome> {
        if self.resolve_pair(category_id, contact_id)?.is_none() {
            return Ok(LinkOutcome::MissingEntity);
        }
        if self.store.remove_membership(category_id, contact_id)? {
            Ok(LinkOutcome::Unlinked)
        } else {
            Ok(LinkOutcome::NotLinked)
        }
    }

    fn resolve_pair(
        &self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> MembershipResult<Option<(Category, Contact)>> {
        let category = self.visible_category(category_id)?;
        let contact = self.visible_contact(contact_id)?;
        match (category, contact) {
            (Some(category), Some(contact)) => Ok(Some((category, contact))),
            (category, contact) => {
                warn!(
                    "event=membership_missing_entity module=membership status=skipped category_id={category_id} contact_id={contact_id} category_found={} contact_found={}",
                    category.is_some(),
                    contact.is_some()
                );
                Ok(None)
            }
        }
    }

    fn require_contact(&self, contact_id: ContactId) -> MembershipResult<Contact> {
        self.visible_contact(contact_id)?
            .ok_or(MembershipError::NotFound(EntityRef::Contact(contact_id)))
    }

    fn visible_contact(&self, contact_id: ContactId) -> MembershipResult<Option<Contact>> {
        let contact = self.store.find_contact(contact_id)?;
        Ok(contact.filter(|contact| self.in_scope(&contact.user_id)))
    }

    fn visible_category(&self, category_id: CategoryId) -> MembershipResult<Option<Category>> {
        let category = self.store.find_category(category_id)?;
        Ok(category.filter(|category| self.in_scope(&category.user_id)))
    }

    fn in_scope(&self, owner: &str) -> bool {
        self.scope.as_deref().map_or(true, |scope| scope == owner)
    }

    fn commit(&mut self) -> MembershipResult<()> {
        if let Err(err) = self.store.persist() {
            return self.abandon(MembershipError::Storage(err));
        }
        Ok(())
    }

    /// Discards staged work and returns `err`.
    fn abandon<T>(&mut self, err: MembershipError) -> MembershipResult<T> {
        if let Err(discard_err) = self.store.discard() {
            error!(
                "event=membership_discard module=membership status=error error={discard_err}"
            );
        }
        Err(err)
    }
}

fn compare_categories(left: &Category, right: &Category) -> Ordering {
    left.name
        .to_lowercase()
        .cmp(&right.name.to_lowercase())
        .then_with(|| left.name.cmp(&right.name))
        .then_with(|| left.id.cmp(&right.id))
}

fn compare_contacts(left: &Contact, right: &Contact) -> Ordering {
    left.last_name
        .to_lowercase()
        .cmp(&right.last_name.to_lowercase())
        .then_with(|| {
            left.first_name
                .to_lowercase()
                .cmp(&right.first_name.to_lowercase())
        })
        .then_with(|| left.id.cmp(&right.id))
}
