//! Relationship store: contacts, categories and the membership relation.
//!
//! # Responsibility
//! - Look up contacts/categories by id for membership orchestration.
//! - Project the single `category_contacts` relation in both directions.
//! - Stage membership writes in a unit of work committed by `persist()`.
//!
//! # Invariants
//! - A (category, contact) pair is stored at most once; add/remove are
//!   idempotent at this layer.
//! - Staged writes become durable only on `persist()`; `discard()` or drop
//!   without persisting rolls them back.
//! - At most one store per connection holds an open unit at a time.
//! - No ownership or existence policy lives here. Linking unknown ids
//!   surfaces as a foreign-key storage error.

use crate::model::category::{Category, CategoryId};
use crate::model::contact::{Contact, ContactId};
use crate::repo::category_repo::{find_category_row, parse_category_row, CATEGORY_SELECT_SQL};
use crate::repo::contact_repo::{find_contact_row, parse_contact_row, CONTACT_SELECT_SQL};
use crate::repo::{ensure_tables, RepoError, RepoResult};
use log::warn;
use rusqlite::{params, Connection};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Keyed by connection address. Stores borrow `&Connection`, so they never
    // leave the thread that opened their unit.
    static CLAIMED_CONNECTIONS: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Storage primitives the membership service is built on.
///
/// Sequences are finite and carry no ordering guarantee; ordering is a
/// service-level policy.
pub trait RelationshipStore {
    fn find_contact(&self, id: ContactId) -> RepoResult<Option<Contact>>;
    fn find_category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    fn contacts_of_category(&self, category_id: CategoryId) -> RepoResult<Vec<Contact>>;
    fn categories_of_contact(&self, contact_id: ContactId) -> RepoResult<Vec<Category>>;
    fn categories_of_user(&self, user_id: &str) -> RepoResult<Vec<Category>>;
    fn has_membership(&self, category_id: CategoryId, contact_id: ContactId) -> RepoResult<bool>;
    /// Stages a link. Returns `false` when the pair was already linked.
    fn add_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool>;
    /// Stages an unlink. Returns `false` when the pair was not linked.
    fn remove_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool>;
    /// Commits every staged change as one unit. No-op when nothing is staged.
    fn persist(&mut self) -> RepoResult<()>;
    /// Drops every staged change. No-op when nothing is staged.
    fn discard(&mut self) -> RepoResult<()>;
}

/// SQLite-backed relationship store.
///
/// The unit of work is a savepoint, so a store can also run inside a
/// transaction the caller already opened on the same connection.
pub struct SqliteRelationshipStore<'conn> {
    conn: &'conn Connection,
    /// Savepoint name of the open unit, if any.
    unit: Option<String>,
}

impl<'conn> SqliteRelationshipStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["contacts", "categories", "category_contacts"])?;
        Ok(Self { conn, unit: None })
    }

    /// Returns whether staged changes are waiting for `persist()`.
    pub fn has_pending(&self) -> bool {
        self.unit.is_some()
    }

    /// Opens this store's savepoint on first write.
    ///
    /// Fails with [`RepoError::UnitInProgress`] while another store holds an
    /// open unit on the same connection: SQLite resolves savepoints as a
    /// stack, so two live units could not end independently.
    fn begin_unit(&mut self) -> RepoResult<()> {
        if self.unit.is_some() {
            return Ok(());
        }

        let key = self.connection_key();
        if !claim_connection(key) {
            return Err(RepoError::UnitInProgress);
        }
        let savepoint = format!(
            "membership_unit_{}",
            NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed)
        );
        if let Err(err) = self.conn.execute_batch(&format!("SAVEPOINT {savepoint};")) {
            release_connection(key);
            return Err(err.into());
        }
        self.unit = Some(savepoint);
        Ok(())
    }

    fn end_unit(&mut self) {
        if self.unit.take().is_some() {
            release_connection(self.connection_key());
        }
    }

    fn connection_key(&self) -> usize {
        self.conn as *const Connection as usize
    }
}

impl RelationshipStore for SqliteRelationshipStore<'_> {
    fn find_contact(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        find_contact_row(self.conn, id)
    }

    fn find_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        find_category_row(self.conn, id)
    }

    fn contacts_of_category(&self, category_id: CategoryId) -> RepoResult<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL}
             INNER JOIN category_contacts cc ON cc.contact_id = c.id
             WHERE cc.category_id = ?1
             ORDER BY c.id ASC;"
        ))?;
        let mut rows = stmt.query([category_id])?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row)?);
        }
        Ok(contacts)
    }

    fn categories_of_contact(&self, contact_id: ContactId) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             INNER JOIN category_contacts cc ON cc.category_id = k.id
             WHERE cc.contact_id = ?1
             ORDER BY k.id ASC;"
        ))?;
        let categories = collect_categories(stmt.query([contact_id])?)?;
        Ok(categories)
    }

    fn categories_of_user(&self, user_id: &str) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE k.user_id = ?1
             ORDER BY k.id ASC;"
        ))?;
        let categories = collect_categories(stmt.query([user_id])?)?;
        Ok(categories)
    }

    fn has_membership(&self, category_id: CategoryId, contact_id: ContactId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM category_contacts
                WHERE category_id = ?1 AND contact_id = ?2
            );",
            params![category_id, contact_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn add_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool> {
        self.begin_unit()?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO category_contacts (category_id, contact_id)
             VALUES (?1, ?2);",
            params![category_id, contact_id],
        )?;
        Ok(changed == 1)
    }

    fn remove_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool> {
        self.begin_unit()?;
        let changed = self.conn.execute(
            "DELETE FROM category_contacts
             WHERE category_id = ?1 AND contact_id = ?2;",
            params![category_id, contact_id],
        )?;
        Ok(changed == 1)
    }

    fn persist(&mut self) -> RepoResult<()> {
        if let Some(savepoint) = &self.unit {
            // A failed release keeps the unit open so `discard()` can still roll back.
            self.conn.execute_batch(&format!("RELEASE {savepoint};"))?;
            self.end_unit();
        }
        Ok(())
    }

    fn discard(&mut self) -> RepoResult<()> {
        if let Some(savepoint) = &self.unit {
            self.conn.execute_batch(&rollback_sql(savepoint))?;
            self.end_unit();
        }
        Ok(())
    }
}

impl Drop for SqliteRelationshipStore<'_> {
    fn drop(&mut self) {
        let Some(savepoint) = &self.unit else {
            return;
        };
        if let Err(err) = self.conn.execute_batch(&rollback_sql(savepoint)) {
            warn!(
                "event=membership_unit_drop module=repo status=error error_code=rollback_failed error={err}"
            );
        } else {
            warn!("event=membership_unit_drop module=repo status=rolled_back");
        }
        self.end_unit();
    }
}

/// Lets a service own a store borrowed elsewhere.
impl<S: RelationshipStore + ?Sized> RelationshipStore for &mut S {
    fn find_contact(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        (**self).find_contact(id)
    }

    fn find_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        (**self).find_category(id)
    }

    fn contacts_of_category(&self, category_id: CategoryId) -> RepoResult<Vec<Contact>> {
        (**self).contacts_of_category(category_id)
    }

    fn categories_of_contact(&self, contact_id: ContactId) -> RepoResult<Vec<Category>> {
        (**self).categories_of_contact(contact_id)
    }

    fn categories_of_user(&self, user_id: &str) -> RepoResult<Vec<Category>> {
        (**self).categories_of_user(user_id)
    }

    fn has_membership(&self, category_id: CategoryId, contact_id: ContactId) -> RepoResult<bool> {
        (**self).has_membership(category_id, contact_id)
    }

    fn add_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool> {
        (**self).add_membership(category_id, contact_id)
    }

    fn remove_membership(
        &mut self,
        category_id: CategoryId,
        contact_id: ContactId,
    ) -> RepoResult<bool> {
        (**self).remove_membership(category_id, contact_id)
    }

    fn persist(&mut self) -> RepoResult<()> {
        (**self).persist()
    }

    fn discard(&mut self) -> RepoResult<()> {
        (**self).discard()
    }
}

fn rollback_sql(savepoint: &str) -> String {
    format!("ROLLBACK TO {savepoint}; RELEASE {savepoint};")
}

fn claim_connection(key: usize) -> bool {
    CLAIMED_CONNECTIONS.with(|claimed| claimed.borrow_mut().insert(key))
}

fn release_connection(key: usize) {
    // `try_with` tolerates stores dropped during thread-local teardown.
    let _ = CLAIMED_CONNECTIONS.try_with(|claimed| claimed.borrow_mut().remove(&key));
}

fn collect_categories(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Category>> {
    let mut categories = Vec::new();
    while let Some(row) = rows.next()? {
        categories.push(parse_category_row(row)?);
    }
    Ok(categories)
}
