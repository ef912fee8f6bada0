//! Contact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and owner-scoped listing over the `contacts` table.
//! - Own the row <-> [`Contact`] mapping reused by the relationship store.
//!
//! # Invariants
//! - Write paths call `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Deleting a contact cascades its `category_contacts` rows.

use crate::model::category::CategoryId;
use crate::model::contact::{Contact, ContactId, ContactImage, NewContact};
use crate::repo::{ensure_tables, EntityRef, RepoError, RepoResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const CONTACT_SELECT_SQL: &str = "SELECT
    c.id AS id,
    c.user_id AS user_id,
    c.first_name AS first_name,
    c.last_name AS last_name,
    c.birth_date AS birth_date,
    c.address1 AS address1,
    c.address2 AS address2,
    c.city AS city,
    c.state AS state,
    c.zip_code AS zip_code,
    c.email AS email,
    c.phone_number AS phone_number,
    c.created_at AS created_at,
    c.image_data AS image_data,
    c.image_type AS image_type
FROM contacts c";

pub(crate) const CONTACT_ORDER_SQL: &str = " ORDER BY
    c.last_name COLLATE NOCASE ASC,
    c.first_name COLLATE NOCASE ASC,
    c.id ASC";

/// Query options for owner-scoped contact listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactListQuery {
    /// Owner whose contacts are listed.
    pub user_id: String,
    /// Restrict to members of one category.
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring filter on the full name.
    pub name_contains: Option<String>,
}

impl ContactListQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// Repository interface for contact CRUD operations.
pub trait ContactRepository {
    fn create_contact(&self, contact: &NewContact) -> RepoResult<ContactId>;
    /// Replaces editable fields; owner and creation time are left untouched.
    fn update_contact(&self, contact: &Contact) -> RepoResult<()>;
    fn get_contact(&self, id: ContactId) -> RepoResult<Option<Contact>>;
    /// Lists contacts ordered by last name, first name, then id.
    fn list_contacts(&self, query: &ContactListQuery) -> RepoResult<Vec<Contact>>;
    fn delete_contact(&self, id: ContactId) -> RepoResult<()>;
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["contacts", "category_contacts"])?;
        Ok(Self { conn })
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn create_contact(&self, contact: &NewContact) -> RepoResult<ContactId> {
        contact.validate()?;
        let (image_data, image_type) = split_image(contact.image.as_ref());

        self.conn.execute(
            "INSERT INTO contacts (
                user_id,
                first_name,
                last_name,
                birth_date,
                address1,
                address2,
                city,
                state,
                zip_code,
                email,
                phone_number,
                created_at,
                image_data,
                image_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                contact.user_id.as_str(),
                contact.first_name.trim(),
                contact.last_name.trim(),
                contact.birth_date.map(format_birth_date),
                contact.address1.as_deref(),
                contact.address2.as_deref(),
                contact.city.as_deref(),
                contact.state.as_deref(),
                contact.zip_code.as_deref(),
                contact.email.trim(),
                contact.phone_number.as_deref(),
                Utc::now().timestamp_millis(),
                image_data,
                image_type,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_contact(&self, contact: &Contact) -> RepoResult<()> {
        contact.validate()?;
        let (image_data, image_type) = split_image(contact.image.as_ref());

        let changed = self.conn.execute(
            "UPDATE contacts
             SET
                first_name = ?2,
                last_name = ?3,
                birth_date = ?4,
                address1 = ?5,
                address2 = ?6,
                city = ?7,
                state = ?8,
                zip_code = ?9,
                email = ?10,
                phone_number = ?11,
                image_data = ?12,
                image_type = ?13
             WHERE id = ?1;",
            params![
                contact.id,
                contact.first_name.trim(),
                contact.last_name.trim(),
                contact.birth_date.map(format_birth_date),
                contact.address1.as_deref(),
                contact.address2.as_deref(),
                contact.city.as_deref(),
                contact.state.as_deref(),
                contact.zip_code.as_deref(),
                contact.email.trim(),
                contact.phone_number.as_deref(),
                image_data,
                image_type,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Contact(contact.id)));
        }

        Ok(())
    }

    fn get_contact(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        find_contact_row(self.conn, id)
    }

    fn list_contacts(&self, query: &ContactListQuery) -> RepoResult<Vec<Contact>> {
        let mut sql = format!("{CONTACT_SELECT_SQL} WHERE c.user_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(query.user_id.clone())];

        if let Some(category_id) = query.category_id {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM category_contacts cc
                    WHERE cc.contact_id = c.id
                      AND cc.category_id = ?
                )",
            );
            bind_values.push(Value::Integer(category_id));
        }
        sql.push_str(CONTACT_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let needle = query
            .name_contains
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);

        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            let contact = parse_contact_row(row)?;
            // SQLite lower() only folds ASCII, so the name filter runs here.
            if let Some(needle) = needle.as_deref() {
                if !contact.full_name().to_lowercase().contains(needle) {
                    continue;
                }
            }
            contacts.push(contact);
        }

        Ok(contacts)
    }

    fn delete_contact(&self, id: ContactId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Contact(id)));
        }

        Ok(())
    }
}

pub(crate) fn find_contact_row(conn: &Connection, id: ContactId) -> RepoResult<Option<Contact>> {
    let mut stmt = conn.prepare(&format!("{CONTACT_SELECT_SQL} WHERE c.id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_contact_row(row)))
        .optional()?;
    row.transpose()
}

pub(crate) fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    let id: ContactId = row.get("id")?;

    let birth_date = match row.get::<_, Option<String>>("birth_date")? {
        Some(text) => Some(
            NaiveDate::parse_from_str(&text, BIRTH_DATE_FORMAT).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid birth date `{text}` in contacts.birth_date (id {id})"
                ))
            })?,
        ),
        None => None,
    };

    let created_millis: i64 = row.get("created_at")?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_millis).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{created_millis}` in contacts.created_at (id {id})"
        ))
    })?;

    let image = match (
        row.get::<_, Option<Vec<u8>>>("image_data")?,
        row.get::<_, Option<String>>("image_type")?,
    ) {
        (Some(data), Some(mime_type)) => Some(ContactImage { data, mime_type }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "contacts.image_data and contacts.image_type disagree (id {id})"
            )));
        }
    };

    let contact = Contact {
        id,
        user_id: row.get("user_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        birth_date,
        address1: row.get("address1")?,
        address2: row.get("address2")?,
        city: row.get("city")?,
        state: row.get("state")?,
        zip_code: row.get("zip_code")?,
        email: row.get("email")?,
        phone_number: row.get("phone_number")?,
        created_at,
        image,
    };
    contact.validate()?;
    Ok(contact)
}

fn format_birth_date(date: NaiveDate) -> String {
    date.format(BIRTH_DATE_FORMAT).to_string()
}

fn split_image(image: Option<&ContactImage>) -> (Option<&[u8]>, Option<&str>) {
    match image {
        Some(image) => (Some(image.data.as_slice()), Some(image.mime_type.as_str())),
        None => (None, None),
    }
}
