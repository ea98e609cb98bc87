//! Notionizer - Identity Cache and Update Tests

mod common;

use std::sync::Arc;

use common::{database_session, page_id, page_record, session};
use notionizer::{Error, IdentityCache, ObjectId, ObjectKind, Page, RemoteObject};
use serde_json::json;

fn fetched_page(n: u32) -> (notionizer::Notion, Arc<common::MockTransport>, Page) {
  let (notion, mock) = session();
  mock.respond(page_record(n, "TitleFixed1", 2));
  let page = notion.get_page(&page_id(n)).unwrap();
  (notion, mock, page)
}

#[test]
fn test_get_page_registers_object() {
  let (notion, mock, page) = fetched_page(1);

  assert_eq!(mock.last_call().path, format!("v1/pages/{}", page_id(1)));
  assert_eq!(page.id().to_string(), page_id(1));
  assert_eq!(page.title(), "TitleFixed1");
  assert_eq!(page.version(), 0);
  assert!(notion.cache().contains(&page.id()));
}

#[test]
fn test_update_is_seen_through_every_handle() {
  let (_notion, mock, page) = fetched_page(1);
  let alias = page.clone();

  mock.respond(json!({
    "object": "page",
    "id": page_id(1),
    "icon": {"type": "emoji", "emoji": "🐿"}
  }));
  page.set("icon", json!({"type": "emoji", "emoji": "🐿"})).unwrap();

  assert_eq!(alias.get("icon"), Some(json!({"type": "emoji", "emoji": "🐿"})));
  // fields the response left out are carried forward
  assert_eq!(alias.get("archived"), Some(json!(false)));
  assert_eq!(alias.title(), "TitleFixed1");
  assert_eq!(alias.version(), 1);
  assert!(alias.same_object(&page));
}

#[test]
fn test_assignment_issues_exactly_one_patch() {
  let (_notion, mock, page) = fetched_page(7);
  let before = mock.call_count();

  mock.respond(json!({"object": "page", "id": page_id(7), "archived": true}));
  page.set("archived", json!(true)).unwrap();

  assert_eq!(mock.call_count(), before + 1);
  let call = mock.last_call();
  assert_eq!(call.method, "PATCH");
  assert_eq!(call.path, format!("v1/pages/{}", page_id(7)));
  assert_eq!(call.payload, Some(json!({"archived": true})));
  assert!(page.is_archived());
}

#[test]
fn test_same_value_still_issues_request() {
  let (_notion, mock, page) = fetched_page(2);

  mock.respond(json!({"object": "page", "id": page_id(2), "archived": false}));
  mock.respond(json!({"object": "page", "id": page_id(2), "archived": false}));
  page.set("archived", json!(false)).unwrap();
  page.set("archived", json!(false)).unwrap();

  assert_eq!(mock.call_count(), 3);
  assert_eq!(page.version(), 2);
}

#[test]
fn test_read_only_assignment_fails_without_request() {
  let (_notion, mock, page) = fetched_page(3);

  for field in ["id", "properties", "parent", "created_time", "not_a_field"] {
    let err = page.set(field, json!("x")).unwrap_err();
    assert!(matches!(err, Error::PropertyAccess(_)), "{}", field);
  }
  assert_eq!(mock.call_count(), 1);
  assert_eq!(page.id().to_string(), page_id(3));
}

#[test]
fn test_fresh_fetch_replaces_registration() {
  let (notion, mock, first) = fetched_page(4);

  mock.respond(page_record(4, "Renamed", 5));
  let second = notion.get_page(&page_id(4)).unwrap();

  assert!(!first.same_object(&second));
  assert_eq!(first.title(), "TitleFixed1");
  assert_eq!(second.title(), "Renamed");
  let current = notion.cache().current(&first.id()).unwrap();
  assert_eq!(current.version(), 0);
  assert_eq!(
    current.get("properties").unwrap()["Number"]["number"],
    json!(5)
  );
}

#[test]
fn test_update_through_stale_handle_becomes_current() {
  let (notion, mock, first) = fetched_page(5);
  mock.respond(page_record(5, "Fresh", 1));
  let _second = notion.get_page(&page_id(5)).unwrap();

  mock.respond(json!({"object": "page", "id": page_id(5), "archived": true}));
  first.set("archived", json!(true)).unwrap();

  let registered = notion.cache().entry(&first.id()).unwrap();
  assert!(Arc::ptr_eq(&registered, first.handle().entry()));
  assert!(first.is_archived());
}

#[test]
fn test_partial_update_merge() {
  let cache = IdentityCache::new();
  let id = page_id(9);
  cache
    .register(ObjectKind::Page, json!({"object": "page", "id": id, "a": 1, "b": 2}))
    .unwrap();

  let target = ObjectId::parse(&id).unwrap();
  let entry = cache
    .apply(&target, ObjectKind::Page, json!({"object": "page", "id": id, "a": 9}))
    .unwrap();

  let snapshot = entry.load();
  assert_eq!(snapshot.get("a"), Some(&json!(9)));
  assert_eq!(snapshot.get("b"), Some(&json!(2)));
  assert_eq!(snapshot.version(), 1);
}

#[test]
fn test_kind_mismatch_is_rejected() {
  let (notion, mock) = session();
  mock.respond(page_record(1, "x", 1));
  let err = notion.get_database(&page_id(1)).unwrap_err();
  assert!(matches!(err, Error::SchemaAssertion { .. }));
  assert!(notion.cache().is_empty());
}

#[test]
fn test_failed_update_leaves_state_untouched() {
  let (_notion, mock, page) = fetched_page(6);
  mock.fail(Error::Api {
    status: 409,
    code: "conflict_error".to_string(),
    message: "Conflict occurred while saving".to_string(),
  });

  let err = page.set("icon", json!(null)).unwrap_err();
  assert!(matches!(err, Error::Api { status: 409, .. }));
  assert_eq!(page.version(), 0);
}

#[test]
fn test_refresh_merges_full_record() {
  let (_notion, mock, page) = fetched_page(8);
  mock.respond(page_record(8, "Edited elsewhere", 2));

  page.refresh().unwrap();

  assert_eq!(mock.last_call().method, "GET");
  assert_eq!(page.title(), "Edited elsewhere");
  assert_eq!(page.version(), 1);
}

#[test]
fn test_set_property() {
  let (_notion, mock, page) = fetched_page(10);
  mock.respond(page_record(10, "TitleFixed1", 3));

  page.set_property("Number", &json!(3)).unwrap();

  let call = mock.last_call();
  assert_eq!(call.method, "PATCH");
  assert_eq!(call.payload, Some(json!({"properties": {"Number": {"number": 3}}})));
  assert_eq!(page.property("Number"), Some(json!(3)));
}

#[test]
fn test_set_property_validates_first() {
  let (_notion, mock, page) = fetched_page(11);

  assert!(matches!(page.set_property("Total", &json!(1)), Err(Error::Validation(_))));
  assert!(matches!(page.set_property("Number", &json!("one")), Err(Error::Validation(_))));
  assert!(matches!(page.set_property("Missing", &json!(1)), Err(Error::Validation(_))));
  assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_containers() {
  let (_notion, mock, db) = database_session();

  let mut title = db.compound("title").unwrap();
  assert!(title.is_mutable());
  title.set_at(0, json!({"type": "text", "text": {"content": "Renamed"}})).unwrap();

  let mut properties = db.compound("properties").unwrap();
  assert!(!properties.is_mutable());
  assert!(matches!(properties.remove("Number"), Err(Error::PropertyAccess(_))));
  assert!(db.schema().unwrap().get("Number").is_some());

  mock.respond(json!({
    "object": "database",
    "id": common::DB_ID,
    "title": [{"type": "text", "text": {"content": "Renamed"}, "plain_text": "Renamed"}]
  }));
  db.set_compound("title", title).unwrap();
  assert_eq!(
    mock.last_call().payload,
    Some(json!({"title": [{"type": "text", "text": {"content": "Renamed"}}]}))
  );
  assert_eq!(db.title(), "Renamed");
}

#[test]
fn test_sessions_can_share_a_cache() {
  let (notion, mock, page) = fetched_page(12);
  let other = notionizer::Notion::from_parts(mock.clone(), notion.cache().clone());

  assert!(other.cache().contains(&page.id()));
  notion.cache().forget(&page.id());
  assert!(!other.cache().contains(&page.id()));
  // handles keep working after their registration is dropped
  assert_eq!(page.title(), "TitleFixed1");
}
