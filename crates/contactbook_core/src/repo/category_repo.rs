//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `categories` table.
//! - Own the row <-> [`Category`] mapping reused by the relationship store.
//!
//! # Invariants
//! - Names are stored trimmed and must not be blank.
//! - Deleting a category cascades its `category_contacts` rows.

use crate::model::category::{Category, CategoryId, NewCategory};
use crate::model::require_text;
use crate::repo::{ensure_tables, EntityRef, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const CATEGORY_SELECT_SQL: &str = "SELECT
    k.id AS id,
    k.user_id AS user_id,
    k.name AS name
FROM categories k";

/// Repository interface for category CRUD operations.
pub trait CategoryRepository {
    fn create_category(&self, category: &NewCategory) -> RepoResult<CategoryId>;
    fn rename_category(&self, id: CategoryId, name: &str) -> RepoResult<()>;
    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    fn delete_category(&self, id: CategoryId) -> RepoResult<()>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["categories", "category_contacts"])?;
        Ok(Self { conn })
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn create_category(&self, category: &NewCategory) -> RepoResult<CategoryId> {
        category.validate()?;
        self.conn.execute(
            "INSERT INTO categories (user_id, name) VALUES (?1, ?2);",
            params![category.user_id.as_str(), category.name.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn rename_category(&self, id: CategoryId, name: &str) -> RepoResult<()> {
        let name = name.trim();
        require_text("name", name)?;

        let changed = self.conn.execute(
            "UPDATE categories SET name = ?2 WHERE id = ?1;",
            params![id, name],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Category(id)));
        }
        Ok(())
    }

    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        find_category_row(self.conn, id)
    }

    fn delete_category(&self, id: CategoryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Category(id)));
        }
        Ok(())
    }
}

pub(crate) fn find_category_row(
    conn: &Connection,
    id: CategoryId,
) -> RepoResult<Option<Category>> {
    let mut stmt = conn.prepare(&format!("{CATEGORY_SELECT_SQL} WHERE k.id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_category_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let category = Category {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
    };
    category.validate()?;
    Ok(category)
}
