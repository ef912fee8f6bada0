use contactbook_core::db::open_db_in_memory;
use contactbook_core::{
    CategoryId, CategoryService, ContactId, ContactService, EntityRef, LinkOutcome,
    MembershipError, MembershipService, NewContact, SqliteCategoryRepository,
    SqliteContactRepository, SqliteRelationshipStore,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

fn membership(conn: &Connection) -> MembershipService<SqliteRelationshipStore<'_>> {
    MembershipService::new(SqliteRelationshipStore::try_new(conn).unwrap())
}

fn seed_contact(conn: &Connection, user_id: &str, first: &str, last: &str) -> ContactId {
    let service = ContactService::new(SqliteContactRepository::try_new(conn).unwrap());
    let email = format!("{first}.{last}@example.com").to_lowercase();
    service
        .create_contact(&NewContact::new(user_id, first, last, email))
        .unwrap()
        .id
}

fn seed_category(conn: &Connection, user_id: &str, name: &str) -> CategoryId {
    let service = CategoryService::new(SqliteCategoryRepository::try_new(conn).unwrap());
    service.create_category(user_id, name).unwrap().id
}

fn link_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM category_contacts;", [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn id_set(ids: Vec<CategoryId>) -> BTreeSet<CategoryId> {
    ids.into_iter().collect()
}

#[test]
fn add_link_then_is_linked_is_true() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    assert!(!service.is_linked(family, contact).unwrap());
    assert_eq!(service.add_link(family, contact).unwrap(), LinkOutcome::Linked);
    assert!(service.is_linked(family, contact).unwrap());
}

#[test]
fn add_link_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    assert_eq!(service.add_link(family, contact).unwrap(), LinkOutcome::Linked);
    assert_eq!(
        service.add_link(family, contact).unwrap(),
        LinkOutcome::AlreadyLinked
    );
    assert_eq!(service.category_ids_of(contact).unwrap(), vec![family]);
    assert_eq!(link_rows(&conn), 1);
}

#[test]
fn remove_link_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    assert_eq!(
        service.remove_link(family, contact).unwrap(),
        LinkOutcome::NotLinked
    );

    service.add_link(family, contact).unwrap();
    assert_eq!(
        service.remove_link(family, contact).unwrap(),
        LinkOutcome::Unlinked
    );
    assert_eq!(
        service.remove_link(family, contact).unwrap(),
        LinkOutcome::NotLinked
    );
    assert!(!service.is_linked(family, contact).unwrap());
}

#[test]
fn link_calls_with_missing_entities_are_silent_noops() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    assert_eq!(
        service.add_link(9_999, contact).unwrap(),
        LinkOutcome::MissingEntity
    );
    assert_eq!(
        service.add_link(family, 9_999).unwrap(),
        LinkOutcome::MissingEntity
    );
    assert_eq!(
        service.remove_link(9_999, contact).unwrap(),
        LinkOutcome::MissingEntity
    );
    assert_eq!(link_rows(&conn), 0);
}

#[test]
fn is_linked_with_unknown_ids_returns_false() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let service = membership(&conn);

    assert!(!service.is_linked(9_999, contact).unwrap());
    assert!(!service.is_linked(9_999, 8_888).unwrap());
}

#[test]
fn categories_of_unknown_contact_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = membership(&conn);

    assert!(matches!(
        service.categories_of(42).unwrap_err(),
        MembershipError::NotFound(EntityRef::Contact(42))
    ));
    assert!(matches!(
        service.category_ids_of(42).unwrap_err(),
        MembershipError::NotFound(EntityRef::Contact(42))
    ));
}

#[test]
fn categories_of_returns_full_set_sorted_by_name() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let work = seed_category(&conn, "u1", "Work");
    let family = seed_category(&conn, "u1", "family");
    let mut service = membership(&conn);
    service.add_link(work, contact).unwrap();
    service.add_link(family, contact).unwrap();

    let names: Vec<String> = service
        .categories_of(contact)
        .unwrap()
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, vec!["family".to_string(), "Work".to_string()]);
    assert_eq!(service.category_ids_of(contact).unwrap(), vec![family, work]);
}

#[test]
fn replace_sets_exact_membership_regardless_of_prior_state() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let alpha = seed_category(&conn, "u1", "Alpha");
    let beta = seed_category(&conn, "u1", "Beta");
    let gamma = seed_category(&conn, "u1", "Gamma");
    let mut service = membership(&conn);

    for prior in [vec![], vec![alpha], vec![gamma], vec![alpha, beta, gamma]] {
        service.replace_contact_categories(contact, &prior).unwrap();

        let summary = service
            .replace_contact_categories(contact, &[alpha, beta])
            .unwrap();
        assert!(summary.skipped.is_empty());
        assert_eq!(
            id_set(service.category_ids_of(contact).unwrap()),
            id_set(vec![alpha, beta]),
            "prior state {prior:?}"
        );
    }
}

#[test]
fn replace_reports_removed_and_added_counts() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let alpha = seed_category(&conn, "u1", "Alpha");
    let beta = seed_category(&conn, "u1", "Beta");
    let gamma = seed_category(&conn, "u1", "Gamma");
    let mut service = membership(&conn);
    service
        .replace_contact_categories(contact, &[alpha, beta])
        .unwrap();

    let summary = service
        .replace_contact_categories(contact, &[beta, gamma])
        .unwrap();
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.added, 1);
}

#[test]
fn replace_with_empty_set_clears_membership() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let work = seed_category(&conn, "u1", "Work");
    let mut service = membership(&conn);
    service
        .replace_contact_categories(contact, &[family, work])
        .unwrap();

    let summary = service.replace_contact_categories(contact, &[]).unwrap();
    assert_eq!(summary.removed, 2);
    assert!(service.category_ids_of(contact).unwrap().is_empty());
}

#[test]
fn replace_family_with_work_scenario() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let work = seed_category(&conn, "u1", "Work");
    let mut service = membership(&conn);
    service.add_link(family, contact).unwrap();

    service.replace_contact_categories(contact, &[work]).unwrap();

    assert_eq!(service.category_ids_of(contact).unwrap(), vec![work]);
    assert!(!service.is_linked(family, contact).unwrap());
}

#[test]
fn replace_collapses_duplicates_and_skips_missing_categories() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    let summary = service
        .replace_contact_categories(contact, &[family, family, 9_999])
        .unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.skipped, vec![9_999]);
    assert_eq!(service.category_ids_of(contact).unwrap(), vec![family]);
    assert_eq!(link_rows(&conn), 1);
}

#[test]
fn replace_for_unknown_contact_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);

    assert!(matches!(
        service.replace_contact_categories(77, &[family]).unwrap_err(),
        MembershipError::NotFound(EntityRef::Contact(77))
    ));
    assert_eq!(link_rows(&conn), 0);
}

#[test]
fn deleting_category_removes_it_from_every_contact() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let alan = seed_contact(&conn, "u1", "Alan", "Turing");
    let family = seed_category(&conn, "u1", "Family");
    let work = seed_category(&conn, "u1", "Work");
    let mut service = membership(&conn);
    service.replace_contact_categories(ada, &[family, work]).unwrap();
    service.replace_contact_categories(alan, &[family]).unwrap();

    CategoryService::new(SqliteCategoryRepository::try_new(&conn).unwrap())
        .delete_category(family)
        .unwrap();

    assert_eq!(service.category_ids_of(ada).unwrap(), vec![work]);
    assert!(service.category_ids_of(alan).unwrap().is_empty());
    assert_eq!(link_rows(&conn), 1);
}

#[test]
fn deleting_contact_removes_it_from_every_category() {
    let conn = open_db_in_memory().unwrap();
    let ada = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let alan = seed_contact(&conn, "u1", "Alan", "Turing");
    let family = seed_category(&conn, "u1", "Family");
    let work = seed_category(&conn, "u1", "Work");
    let mut service = membership(&conn);
    service.replace_contact_categories(ada, &[family, work]).unwrap();
    service.replace_contact_categories(alan, &[family]).unwrap();

    ContactService::new(SqliteContactRepository::try_new(&conn).unwrap())
        .delete_contact(ada)
        .unwrap();

    let family_members: Vec<ContactId> = service
        .contacts_in(family)
        .unwrap()
        .into_iter()
        .map(|contact| contact.id)
        .collect();
    assert_eq!(family_members, vec![alan]);
    assert!(service.contacts_in(work).unwrap().is_empty());
    assert_eq!(link_rows(&conn), 1);
}

#[test]
fn categories_owned_by_is_sorted_and_owner_scoped() {
    let conn = open_db_in_memory().unwrap();
    seed_category(&conn, "u1", "work");
    seed_category(&conn, "u1", "Family");
    seed_category(&conn, "u2", "Aardvarks");
    seed_category(&conn, "u1", "Book club");
    let service = membership(&conn);

    let categories = service.categories_owned_by("u1").unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Book club", "Family", "work"]);
    assert!(categories.iter().all(|c| c.user_id == "u1"));
    assert!(service.categories_owned_by("nobody").unwrap().is_empty());
}

#[test]
fn contacts_in_is_sorted_and_reports_missing_category() {
    let conn = open_db_in_memory().unwrap();
    let turing = seed_contact(&conn, "u1", "Alan", "Turing");
    let hopper = seed_contact(&conn, "u1", "Grace", "Hopper");
    let ada = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let mut service = membership(&conn);
    for contact in [turing, hopper, ada] {
        service.add_link(family, contact).unwrap();
    }

    let ids: Vec<ContactId> = service
        .contacts_in(family)
        .unwrap()
        .into_iter()
        .map(|contact| contact.id)
        .collect();
    assert_eq!(ids, vec![hopper, ada, turing]);

    assert!(matches!(
        service.contacts_in(9_999).unwrap_err(),
        MembershipError::NotFound(EntityRef::Category(9_999))
    ));
}

#[test]
fn cross_owner_link_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let foreign = seed_category(&conn, "u2", "Family");
    let mut service = membership(&conn);

    assert!(matches!(
        service.add_link(foreign, contact).unwrap_err(),
        MembershipError::OwnerMismatch { .. }
    ));
    assert_eq!(link_rows(&conn), 0);
}

#[test]
fn replace_with_cross_owner_category_keeps_prior_set() {
    let conn = open_db_in_memory().unwrap();
    let contact = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let family = seed_category(&conn, "u1", "Family");
    let work = seed_category(&conn, "u1", "Work");
    let foreign = seed_category(&conn, "u2", "Theirs");
    let mut service = membership(&conn);
    service.add_link(family, contact).unwrap();

    let err = service
        .replace_contact_categories(contact, &[work, foreign])
        .unwrap_err();
    assert!(matches!(err, MembershipError::OwnerMismatch { .. }));
    assert_eq!(service.category_ids_of(contact).unwrap(), vec![family]);
}

#[test]
fn scoped_service_treats_foreign_entities_as_missing() {
    let conn = open_db_in_memory().unwrap();
    let mine = seed_contact(&conn, "u1", "Ada", "Lovelace");
    let theirs = seed_contact(&conn, "u2", "Alan", "Turing");
    let my_category = seed_category(&conn, "u1", "Family");
    let their_category = seed_category(&conn, "u2", "Work");
    membership(&conn).add_link(their_category, theirs).unwrap();

    let mut scoped =
        MembershipService::scoped(SqliteRelationshipStore::try_new(&conn).unwrap(), "u1");
    assert_eq!(scoped.scope(), Some("u1"));

    assert_eq!(
        scoped.add_link(their_category, mine).unwrap(),
        LinkOutcome::MissingEntity
    );
    assert_eq!(
        scoped.remove_link(their_category, theirs).unwrap(),
        LinkOutcome::MissingEntity
    );
    assert!(!scoped.is_linked(their_category, theirs).unwrap());
    assert!(matches!(
        scoped.categories_of(theirs).unwrap_err(),
        MembershipError::NotFound(EntityRef::Contact(_))
    ));
    assert!(scoped.categories_owned_by("u2").unwrap().is_empty());

    let summary = scoped
        .replace_contact_categories(mine, &[my_category, their_category])
        .unwrap();
    assert_eq!(summary.skipped, vec![their_category]);
    assert_eq!(scoped.category_ids_of(mine).unwrap(), vec![my_category]);
    assert_eq!(link_rows(&conn), 2);
}
