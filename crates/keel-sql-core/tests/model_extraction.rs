//! Integration tests for model extraction.
//!
//! Covers the tag language, primary key detection, reference resolution and
//! the configuration errors raised for invalid declarations.

use std::collections::HashMap;

use keel_sql_core::model::Stamp;
use keel_sql_core::naming::{to_camel_case, to_snake_case};
use keel_sql_core::prelude::*;
use keel_sql_core::{Error, FieldKind, ScalarKind};
use keel_sql_derive::{Record, Reflect};

fn extract<R: Record>(record: &mut R) -> keel_sql_core::Result<Model> {
    Extractor::default().extract(record, true, &[])
}

// =============================================================================
// Tags and primary keys
// =============================================================================

#[derive(Debug, Default, Record)]
#[table(name = "accounts")]
struct Account {
    #[column("pk,size:32")]
    code: String,
    #[column("size:64,unique,notnull")]
    email: String,
    #[column("index")]
    region: Option<String>,
    #[column("-")]
    scratch: String,
    #[column("-")]
    cache: std::cell::Cell<u32>,
    labels: HashMap<String, String>,
    history: Vec<i64>,
    avatar: Vec<u8>,
    #[column("created")]
    opened: chrono::DateTime<chrono::Utc>,
    updated: chrono::DateTime<chrono::Utc>,
}

#[test]
fn test_account_columns() {
    let model = extract(&mut Account::default()).unwrap();
    assert_eq!(model.table, "accounts");
    let columns: Vec<_> = model.fields.iter().map(|f| f.column.as_str()).collect();
    assert_eq!(columns, vec!["code", "email", "region", "avatar", "opened", "updated"]);

    let pk = model.primary_key().unwrap();
    assert_eq!(pk.column, "code");
    assert_eq!(pk.kind, ScalarKind::Text);
    assert_eq!(pk.size, Some(32));

    let email = model.field("email").unwrap();
    assert!(email.unique && email.not_null);
    assert!(model.field("region").unwrap().nullable);
    assert_eq!(model.field("avatar").unwrap().kind, ScalarKind::Bytes);
}

#[test]
fn test_account_indexes_and_stamps() {
    let model = extract(&mut Account::default()).unwrap();
    let indexes: Vec<_> = model
        .indexes
        .iter()
        .map(|i| (i.name.as_str(), i.unique))
        .collect();
    assert_eq!(indexes, vec![("email", true), ("region", false)]);
    assert_eq!(model.time_field(Stamp::Created), model.fields.iter().position(|f| f.column == "opened"));
    assert_eq!(model.time_field(Stamp::Updated), model.fields.iter().position(|f| f.column == "updated"));
}

#[test]
fn test_declared_field_kinds() {
    let account = Account::default();
    let kinds: Vec<_> = account.fields().iter().map(|d| (d.name, d.kind)).collect();
    assert!(kinds.contains(&("labels", FieldKind::Map)));
    assert!(kinds.contains(&("history", FieldKind::Sequence)));
    assert!(kinds.contains(&("region", FieldKind::Nullable(ScalarKind::Text))));
    // An ignored field of an unsupported type is not declared at all.
    assert!(!kinds.iter().any(|(name, _)| *name == "cache"));
}

#[derive(Debug, Default, Record)]
struct Conventional {
    id: i64,
    name: String,
}

#[derive(Debug, Default, Record)]
struct StringId {
    id: String,
    name: String,
}

#[test]
fn test_identifier_convention() {
    let model = extract(&mut Conventional::default()).unwrap();
    assert_eq!(model.primary_key().unwrap().column, "id");

    // Only an integer `id` is taken as the key.
    let model = extract(&mut StringId::default()).unwrap();
    assert!(model.primary_key().is_none());
}

#[derive(Debug, Default, Record)]
struct TwoKeys {
    #[column("pk")]
    first: i64,
    #[column("pk")]
    second: i64,
}

#[test]
fn test_duplicate_primary_key() {
    let err = extract(&mut TwoKeys::default()).unwrap_err();
    assert!(err.is_config());
    match err {
        Error::DuplicatePrimaryKey { type_name, first, second } => {
            assert_eq!(type_name, "TwoKeys");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug, Default, Record)]
struct ExplicitOverId {
    id: i64,
    #[column("pk")]
    serial: i64,
}

#[test]
fn test_explicit_pk_wins_over_identifier() {
    let model = extract(&mut ExplicitOverId::default()).unwrap();
    assert_eq!(model.primary_key().unwrap().column, "serial");
    assert!(!model.field("id").unwrap().primary_key);
}

#[derive(Debug, Default, Record)]
struct UnknownWithValue {
    id: i64,
    #[column("sise:64")]
    name: String,
}

#[derive(Debug, Default, Record)]
struct UnknownFlag {
    id: i64,
    #[column("primary")]
    name: String,
}

#[test]
fn test_unknown_tag_with_value() {
    let err = extract(&mut UnknownWithValue::default()).unwrap_err();
    assert!(err.is_config());
    match err {
        Error::UnknownTag { field, key, value } => {
            assert_eq!(field, "name");
            assert_eq!(key, "sise");
            assert_eq!(value.as_deref(), Some("64"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_tag_without_value() {
    let err = extract(&mut UnknownFlag::default()).unwrap_err();
    match err {
        Error::UnknownTag { key, value, .. } => {
            assert_eq!(key, "primary");
            assert_eq!(value, None);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug, Default, Record)]
struct BadSize {
    id: i64,
    #[column("size:wide")]
    name: String,
}

#[test]
fn test_malformed_tag() {
    let err = extract(&mut BadSize::default()).unwrap_err();
    assert!(matches!(err, Error::TagSyntax { ref token, .. } if token == "size:wide"));
}

// =============================================================================
// References
// =============================================================================

#[derive(Debug, Default, Record)]
struct Author {
    id: i64,
    name: String,
}

#[derive(Debug, Default, Record)]
struct Book {
    id: i64,
    #[column("join:writer")]
    written_by: i64,
    writer: Option<Box<Author>>,
    #[column("fk:editor,join:writer")]
    editor_id: i64,
    editor: Option<Box<Author>>,
}

#[test]
fn test_explicit_references() {
    let mut book = Book::default();
    let model = extract(&mut book).unwrap();

    let writer = &model.references["writer"];
    assert_eq!(writer.local_column, "written_by");
    assert!(!writer.foreign_key);

    // `fk` takes priority over `join` on the same field.
    let editor = &model.references["editor"];
    assert_eq!(editor.local_column, "editor_id");
    assert!(editor.foreign_key);
    assert_eq!(editor.target.table, "author");

    assert!(book.writer.is_some() && book.editor.is_some());
    let indexes: Vec<_> = model.indexes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(indexes, vec!["written_by", "editor_id"]);
}

#[test]
fn test_reference_keeps_existing_value() {
    let mut book = Book {
        writer: Some(Box::new(Author {
            id: 9,
            name: "Le Guin".into(),
        })),
        ..Book::default()
    };
    let model = extract(&mut book).unwrap();
    let target = &model.references["writer"].target;
    assert_eq!(target.primary_key().unwrap().value, SqlValue::Int(9));
    assert_eq!(book.writer.unwrap().name, "Le Guin");
}

#[derive(Debug, Default, Record)]
struct DanglingReference {
    id: i64,
    #[column("fk:owner")]
    owner_id: i64,
}

#[derive(Debug, Default, Record)]
struct ScalarReference {
    id: i64,
    #[column("join:label")]
    label_id: i64,
    label: String,
}

#[test]
fn test_missing_reference_field() {
    let err = extract(&mut DanglingReference::default()).unwrap_err();
    assert!(err.is_config());
    match err {
        Error::MissingReferenceField { field, reference, .. } => {
            assert_eq!(field, "owner_id");
            assert_eq!(reference, "owner");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reference_not_pointer() {
    let err = extract(&mut ScalarReference::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::ReferenceNotPointer { ref reference, .. } if reference == "label"
    ));
}

#[derive(Debug, Default, Record)]
struct Keyless {
    name: String,
}

#[derive(Debug, Default, Record)]
struct PointsAtKeyless {
    id: i64,
    keyless_id: i64,
    keyless: Option<Box<Keyless>>,
}

#[test]
fn test_reference_target_needs_primary_key() {
    let err = extract(&mut PointsAtKeyless::default()).unwrap_err();
    assert!(matches!(err, Error::MissingPrimaryKey { ref table } if table == "keyless"));
}

#[derive(Debug, Default, Record)]
struct Loose {
    id: i64,
    // Not an integer, so no implicit join.
    author_id: String,
    author: Option<Box<Author>>,
}

#[test]
fn test_implicit_join_needs_integer_key() {
    let mut loose = Loose::default();
    let model = extract(&mut loose).unwrap();
    assert!(model.references.is_empty());
    assert!(loose.author.is_none());
}

// =============================================================================
// Hooks and naming
// =============================================================================

#[derive(Debug, Default, Reflect)]
struct Event {
    id: i64,
    kind: String,
    at: chrono::DateTime<chrono::Utc>,
}

impl Record for Event {
    fn indexes(indexes: &mut Indexes) {
        indexes.add_unique(["kind", "at"]);
    }

    fn validate(&self) -> Result<(), String> {
        if self.kind.is_empty() {
            return Err("kind is required".into());
        }
        Ok(())
    }
}

#[test]
fn test_record_hooks() {
    let mut event = Event::default();
    let model = extract(&mut event).unwrap();
    let spec = model.indexes.iter().next().unwrap();
    assert_eq!(spec.name, "kind_at");
    assert_eq!(spec.qualified_name(&model.table), "event_kind_at");
    assert!(spec.unique);
    assert_eq!(event.validate(), Err("kind is required".to_string()));

    // The hook only runs for the root of an extraction.
    let nested = Extractor::default().extract(&mut event, false, &[]).unwrap();
    assert!(nested.indexes.is_empty());
}

#[test]
fn test_custom_naming() {
    let naming = Naming {
        column: to_camel_case,
        table: to_snake_case,
        identifier: "id",
    };
    let extractor = Extractor::new(naming);
    let mut book = Book::default();
    let model = extractor.extract(&mut book, true, &[]).unwrap();
    assert!(model.field("WrittenBy").is_some());
    assert_eq!(model.references["editor"].local_column, "EditorId");
    assert_eq!(model.primary_key().unwrap().column, "Id");
}

#[test]
fn test_values_are_read_on_every_extraction() {
    let extractor = Extractor::default();
    let mut author = Author {
        id: 1,
        name: "a".into(),
    };
    let first = extractor.extract(&mut author, true, &[]).unwrap();
    author.name = "b".into();
    let second = extractor.extract(&mut author, true, &[]).unwrap();
    assert_eq!(first.field("name").unwrap().value, SqlValue::Text("a".into()));
    assert_eq!(second.field("name").unwrap().value, SqlValue::Text("b".into()));
}
