use authorbook_core::{
    is_valid_gender, Author, AuthorField, AuthorValidationError, FieldChange, Gender, StoreError,
};
use chrono::{Days, Local, NaiveDate};
use std::cell::RefCell;
use std::rc::Rc;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn sample() -> Author {
    Author::new("Ursula", "Le Guin", date(1929, 10, 21), "female").unwrap()
}

#[test]
fn valid_tuples_construct_and_accessors_return_inputs() {
    let cases = [
        ("U", "L", date(1929, 10, 21), "female", Gender::Female),
        ("Octavia", "Butler", date(1947, 6, 22), "FEMALE", Gender::Female),
        ("Stanisław", "Lem", date(1921, 9, 12), "Male", Gender::Male),
        ("Anon", "Ymous", today() - Days::new(1), "unknown", Gender::Unknown),
    ];

    for (first, last, dob, gender_text, gender) in cases {
        let author = Author::new(first, last, dob, gender_text).unwrap();
        assert_eq!(author.first_name(), first);
        assert_eq!(author.last_name(), last);
        assert_eq!(author.date_of_birth(), dob);
        assert_eq!(author.gender(), gender);
        assert_eq!(author.website(), None);
        assert_eq!(author.id(), None);
        assert_eq!(author.last_modified(), None);
        assert!(!author.is_persisted());
    }
}

#[test]
fn names_outside_bounds_fail_naming_the_field() {
    let long = "x".repeat(101);

    let err = Author::new("", "Butler", date(1947, 6, 22), "female").unwrap_err();
    assert_eq!(err, AuthorValidationError::FirstName { chars: 0 });
    assert_eq!(err.field(), AuthorField::FirstName);

    let err = Author::new(long.as_str(), "Butler", date(1947, 6, 22), "female").unwrap_err();
    assert_eq!(err, AuthorValidationError::FirstName { chars: 101 });

    let err = Author::new("Octavia", "", date(1947, 6, 22), "female").unwrap_err();
    assert_eq!(err.field(), AuthorField::LastName);
    assert!(err.to_string().contains("last name"));

    let err = Author::new("Octavia", long.as_str(), date(1947, 6, 22), "female").unwrap_err();
    assert_eq!(err, AuthorValidationError::LastName { chars: 101 });
}

#[test]
fn date_of_birth_today_or_later_is_rejected() {
    for dob in [today(), today() + Days::new(1), today() + Days::new(3650)] {
        let err = Author::new("Time", "Traveller", dob, "unknown").unwrap_err();
        assert_eq!(err.field(), AuthorField::DateOfBirth);
    }
}

#[test]
fn gender_outside_known_values_is_rejected() {
    for gender in ["", "m", "males", "other", " male"] {
        assert!(!is_valid_gender(gender));
        let err = Author::new("Ann", "Leckie", date(1966, 3, 2), gender).unwrap_err();
        assert_eq!(err, AuthorValidationError::Gender(gender.to_string()));
    }
    assert!(is_valid_gender("UnKnOwN"));
}

#[test]
fn website_is_enforced_at_construction_and_empty_means_none() {
    let too_long = "w".repeat(101);
    let err = Author::with_website(
        "Ted",
        "Chiang",
        date(1967, 10, 20),
        "male",
        Some(too_long.as_str()),
    )
    .unwrap_err();
    assert_eq!(err, AuthorValidationError::Website { chars: 101 });

    let author =
        Author::with_website("Ted", "Chiang", date(1967, 10, 20), "male", Some("")).unwrap();
    assert_eq!(author.website(), None);
}

#[test]
fn setters_validate_and_leave_field_unchanged_on_failure() {
    let mut author = sample();

    assert!(author.set_first_name("").is_err());
    assert!(author.set_last_name("y".repeat(101)).is_err());
    assert!(author.set_date_of_birth(today()).is_err());
    assert!(author.set_gender("robot").is_err());
    assert!(author.set_website(Some("w".repeat(101).as_str())).is_err());

    assert_eq!(author, sample());

    author.set_first_name("Ursula K.").unwrap();
    author.set_gender("UNKNOWN").unwrap();
    author.set_website(Some("https://www.ursulakleguin.com")).unwrap();
    assert_eq!(author.first_name(), "Ursula K.");
    assert_eq!(author.gender(), Gender::Unknown);
    assert_eq!(author.website(), Some("https://www.ursulakleguin.com"));
}

#[test]
fn subscribers_see_each_effective_change_until_unsubscribed() {
    let seen: Rc<RefCell<Vec<FieldChange>>> = Rc::default();
    let mut author = sample();
    let sink = Rc::clone(&seen);
    let subscription = author.subscribe(move |change| sink.borrow_mut().push(change.clone()));

    author.set_last_name("Le Guin").unwrap();
    author.set_last_name("LeGuin").unwrap();
    author.set_date_of_birth(date(1929, 10, 22)).unwrap();
    author.set_first_name("").unwrap_err();

    assert_eq!(
        *seen.borrow(),
        vec![
            FieldChange {
                field: AuthorField::LastName,
                old: "Le Guin".to_string(),
                new: "LeGuin".to_string(),
            },
            FieldChange {
                field: AuthorField::DateOfBirth,
                old: "1929-10-21".to_string(),
                new: "1929-10-22".to_string(),
            },
        ]
    );

    assert!(author.unsubscribe(subscription));
    author.set_gender("male").unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn diff_from_lists_changed_fields_in_audit_order() {
    let persisted = sample();
    let mut edited = persisted.clone();
    edited.set_website(Some("https://example.org")).unwrap();
    edited.set_first_name("Ursula K.").unwrap();

    let messages: Vec<String> = edited
        .diff_from(&persisted)
        .iter()
        .map(FieldChange::audit_message)
        .collect();

    assert_eq!(
        messages,
        vec![
            "First name changed from Ursula to Ursula K.".to_string(),
            "Website changed from (none) to https://example.org".to_string(),
        ]
    );
    assert!(persisted.diff_from(&persisted).is_empty());
}

#[test]
fn save_without_gateway_is_a_usage_error() {
    let mut author = sample();
    let err = author.save().unwrap_err();
    assert!(matches!(err, StoreError::GatewayDetached));
    assert!(!err.is_conflict());
}

#[test]
fn display_and_serialization_use_field_values() {
    let author = Author::with_website(
        "N. K.",
        "Jemisin",
        date(1972, 9, 19),
        "Female",
        Some("https://nkjemisin.com"),
    )
    .unwrap();
    assert_eq!(author.to_string(), "N. K. Jemisin");

    let json = serde_json::to_value(&author).unwrap();
    assert_eq!(json["first_name"], "N. K.");
    assert_eq!(json["date_of_birth"], "1972-09-19");
    assert_eq!(json["gender"], "female");
    assert_eq!(json["website"], "https://nkjemisin.com");
    assert!(json["id"].is_null());
    assert!(json.get("gateway").is_none());
}
