use authorbook_core::db::migrations::latest_version;
use authorbook_core::db::open_db_in_memory;
use authorbook_core::{
    Author, AuthorService, AuthorStore, NewAuthorRequest, SqliteAuthorGateway, StoreError,
    AUTHOR_ADDED_MESSAGE,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::rc::Rc;

fn setup() -> Rc<SqliteAuthorGateway> {
    SqliteAuthorGateway::try_new(open_db_in_memory().unwrap()).unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn author(first: &str, last: &str) -> Author {
    Author::with_website(
        first,
        last,
        date(1950, 1, 1),
        "unknown",
        Some("https://example.org"),
    )
    .unwrap()
}

#[test]
fn add_then_get_by_id_roundtrips_fields_and_records_one_audit_entry() {
    let gateway = setup();
    let mut original = Author::with_website(
        "Iain",
        "Banks",
        date(1954, 2, 16),
        "Male",
        Some("https://www.iain-banks.net"),
    )
    .unwrap();

    let id = gateway.add_author(&mut original).unwrap();
    assert_eq!(original.id(), Some(id));
    assert!(original.last_modified().is_some());
    assert!(original.gateway().is_some());

    let loaded = gateway.get_author_by_id(id).unwrap().unwrap();
    assert_eq!(loaded, original);
    assert_eq!(loaded.first_name(), "Iain");
    assert_eq!(loaded.last_name(), "Banks");
    assert_eq!(loaded.date_of_birth(), date(1954, 2, 16));
    assert_eq!(loaded.gender().as_str(), "male");
    assert_eq!(loaded.website(), Some("https://www.iain-banks.net"));
    assert!(loaded.gateway().is_some());

    let trail = gateway.get_audit_trails(&loaded).unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].message, AUTHOR_ADDED_MESSAGE);
    assert_eq!(trail[0].author_id, id);
}

#[test]
fn add_rejects_author_that_already_has_an_id() {
    let gateway = setup();
    let mut stored = author("Jo", "Walton");
    let id = gateway.add_author(&mut stored).unwrap();

    let err = gateway.add_author(&mut stored).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyPersisted(existing) if existing == id));
    assert_eq!(gateway.get_authors().unwrap().len(), 1);
}

#[test]
fn get_author_by_id_returns_none_for_missing_row() {
    let gateway = setup();
    assert!(gateway.get_author_by_id(404).unwrap().is_none());
}

#[test]
fn get_authors_sorts_by_first_name_ascending() {
    let gateway = setup();
    for (first, last) in [
        ("Zadie", "Smith"),
        ("ann", "Leckie"),
        ("Martha", "Wells"),
        ("Becky", "Chambers"),
        ("Ann", "Patchett"),
    ] {
        gateway.add_author(&mut author(first, last)).unwrap();
    }

    let names: Vec<String> = gateway
        .get_authors()
        .unwrap()
        .iter()
        .map(|author| author.to_string())
        .collect();

    assert_eq!(
        names,
        vec![
            "ann Leckie",
            "Ann Patchett",
            "Becky Chambers",
            "Martha Wells",
            "Zadie Smith",
        ]
    );
}

#[test]
fn update_applies_fields_and_advances_last_modified() {
    let gateway = setup();
    let mut stored = author("Kim", "Robinson");
    let id = gateway.add_author(&mut stored).unwrap();
    let before = stored.last_modified().unwrap();

    stored.set_first_name("Kim Stanley").unwrap();
    stored.set_website(None).unwrap();
    gateway.update_author(&mut stored).unwrap();

    let after = stored.last_modified().unwrap();
    assert!(after > before);
    assert_eq!(gateway.get_last_modified(id).unwrap(), Some(after));

    let loaded = gateway.get_author_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.first_name(), "Kim Stanley");
    assert_eq!(loaded.website(), None);
    assert_eq!(loaded, stored);
}

#[test]
fn stale_update_fails_with_conflict_and_leaves_row_untouched() {
    let gateway = setup();
    let mut stored = author("Vernor", "Vinge");
    let id = gateway.add_author(&mut stored).unwrap();

    let mut first_copy = gateway.get_author_by_id(id).unwrap().unwrap();
    let mut second_copy = gateway.get_author_by_id(id).unwrap().unwrap();

    first_copy.set_last_name("Steffan Vinge").unwrap();
    gateway.update_author(&mut first_copy).unwrap();

    second_copy.set_first_name("V.").unwrap();
    let err = gateway.update_author(&mut second_copy).unwrap_err();
    match err {
        StoreError::Conflict {
            author_id,
            expected,
            actual,
        } => {
            assert_eq!(author_id, id);
            assert_eq!(expected, stored.last_modified());
            assert_eq!(Some(actual), first_copy.last_modified());
        }
        other => panic!("unexpected error: {other}"),
    }

    let loaded = gateway.get_author_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.first_name(), "Vernor");
    assert_eq!(loaded.last_name(), "Steffan Vinge");
    assert_eq!(second_copy.last_modified(), stored.last_modified());
}

#[test]
fn conflict_detected_when_row_touched_outside_the_gateway() {
    let gateway = setup();
    let mut stored = author("Gene", "Wolfe");
    let id = gateway.add_author(&mut stored).unwrap();

    gateway
        .connection()
        .execute(
            "UPDATE author SET last_modified = last_modified + 1000 WHERE id = ?1;",
            [id],
        )
        .unwrap();

    stored.set_gender("male").unwrap();
    let err = gateway.update_author(&mut stored).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        gateway.get_author_by_id(id).unwrap().unwrap().gender().as_str(),
        "unknown"
    );
}

#[test]
fn update_requires_identity_and_existing_row() {
    let gateway = setup();

    let mut unsaved = author("Never", "Saved");
    let err = gateway.update_author(&mut unsaved).unwrap_err();
    assert!(matches!(err, StoreError::NotPersisted));

    let mut stored = author("Soon", "Gone");
    let id = gateway.add_author(&mut stored).unwrap();
    gateway.delete_author(&stored).unwrap();
    let err = gateway.update_author(&mut stored).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
}

#[test]
fn delete_removes_row_and_keeps_in_memory_identity() {
    let gateway = setup();
    let mut stored = author("Iain", "Banks");
    let id = gateway.add_author(&mut stored).unwrap();

    gateway.delete_author(&stored).unwrap();

    assert!(gateway.get_author_by_id(id).unwrap().is_none());
    assert_eq!(stored.id(), Some(id));
    assert_eq!(gateway.get_last_modified(id).unwrap(), None);

    gateway.delete_author(&stored).unwrap();
}

#[test]
fn save_delegates_to_the_loading_gateway() {
    let gateway = setup();
    let mut stored = author("Connie", "Willis");
    let id = gateway.add_author(&mut stored).unwrap();

    let mut loaded = gateway.get_author_by_id(id).unwrap().unwrap();
    loaded.set_last_name("Willis-Trimble").unwrap();
    loaded.save().unwrap();

    let reloaded = gateway.get_author_by_id(id).unwrap().unwrap();
    assert_eq!(reloaded.last_name(), "Willis-Trimble");
}

#[test]
fn save_fails_once_gateway_is_dropped() {
    let gateway = setup();
    let mut stored = author("Frank", "Herbert");
    gateway.add_author(&mut stored).unwrap();
    drop(gateway);

    stored.set_first_name("Franklin").unwrap();
    let err = stored.save().unwrap_err();
    assert!(matches!(err, StoreError::GatewayDetached));
}

#[test]
fn read_path_rejects_undecodable_rows() {
    let gateway = setup();
    let mut stored = author("Valid", "Author");
    let id = gateway.add_author(&mut stored).unwrap();

    gateway
        .connection()
        .execute("UPDATE author SET dob = 'not-a-date' WHERE id = ?1;", [id])
        .unwrap();

    let err = gateway.get_author_by_id(id).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn read_path_reports_stored_future_birth_date_as_invalid_data() {
    let gateway = setup();
    let mut stored = author("Future", "Dated");
    let id = gateway.add_author(&mut stored).unwrap();

    gateway
        .connection()
        .execute("UPDATE author SET dob = '2999-01-01' WHERE id = ?1;", [id])
        .unwrap();

    assert!(matches!(
        gateway.get_authors().unwrap_err(),
        StoreError::InvalidData(_)
    ));
    assert!(matches!(
        gateway.get_author_by_id(id).unwrap_err(),
        StoreError::InvalidData(_)
    ));
}

#[test]
fn service_refresh_recovers_from_conflict() {
    let service = AuthorService::new(setup());
    let mut stale = service
        .register_author(&NewAuthorRequest {
            first_name: "Lois".to_string(),
            last_name: "Bujold".to_string(),
            date_of_birth: date(1949, 11, 2),
            gender: "female".to_string(),
            website: None,
        })
        .unwrap();
    let id = stale.id().unwrap();

    let mut other = service.get_author(id).unwrap().unwrap();
    other.set_last_name("McMaster Bujold").unwrap();
    service.update_author(&mut other).unwrap();

    stale.set_website(Some("https://www.dendarii.com")).unwrap();
    assert!(service.update_author(&mut stale).unwrap_err().is_conflict());

    service.refresh(&mut stale).unwrap();
    assert_eq!(stale.last_name(), "McMaster Bujold");
    assert_eq!(stale.website(), None);

    stale.set_website(Some("https://www.dendarii.com")).unwrap();
    service.update_author(&mut stale).unwrap();

    let loaded = service.get_author(id).unwrap().unwrap();
    assert_eq!(loaded.last_name(), "McMaster Bujold");
    assert_eq!(loaded.website(), Some("https://www.dendarii.com"));
}

#[test]
fn service_delete_by_id_reports_absence() {
    let service = AuthorService::new(setup());
    let mut stored = author("Ray", "Bradbury");
    let id = service.add_author(&mut stored).unwrap();

    assert!(service.delete_author_by_id(id).unwrap());
    assert!(!service.delete_author_by_id(id).unwrap());
    assert!(service.list_authors().unwrap().is_empty());
}

#[test]
fn gateway_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteAuthorGateway::try_new(conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn gateway_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE author (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            dob TEXT NOT NULL,
            gender TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteAuthorGateway::try_new(conn),
        Err(StoreError::MissingRequiredColumn {
            table: "author",
            column: "web_site"
        })
    ));
}
