//! Client tests for the notionizer crate.

use std::time::Duration;

use notionizer::{ClientOptions, Error, Notion, NOTION_VERSION};

#[test]
fn test_client_options_default() {
  let opts = ClientOptions::default();
  assert_eq!(opts.base_url, "https://api.notion.com/");
  assert!(opts.auth_token.is_none());
  assert_eq!(opts.notion_version, NOTION_VERSION);
  assert!(opts.timeout.is_none());
}

#[test]
fn test_client_options_with_auth() {
  let opts = ClientOptions::default().with_auth("secret_token");
  assert_eq!(opts.auth_token, Some("secret_token".to_string()));
}

#[test]
fn test_client_options_builder_chain() {
  let opts = ClientOptions::new("http://localhost:8080")
    .with_auth("token123")
    .with_notion_version("2022-06-28")
    .with_timeout(Duration::from_secs(5));

  assert_eq!(opts.base_url, "http://localhost:8080");
  assert_eq!(opts.auth_token, Some("token123".to_string()));
  assert_eq!(opts.notion_version, "2022-06-28");
  assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
}

#[test]
fn test_session_requires_token() {
  let err = Notion::with_options(ClientOptions::default()).unwrap_err();
  assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_session_with_token() {
  let notion = Notion::new("secret_token").unwrap();
  assert!(notion.cache().is_empty());
  let clone = notion.clone();
  assert!(std::sync::Arc::ptr_eq(notion.cache(), clone.cache()));
}

#[test]
fn test_error_display() {
  let err = Error::PropertyAccess("`id` is a read-only field of page".to_string());
  assert_eq!(format!("{}", err), "Property access error: `id` is a read-only field of page");

  let err = Error::Validation("`Total` (formula) is computed".to_string());
  assert_eq!(format!("{}", err), "Validation error: `Total` (formula) is computed");

  let err = Error::SchemaAssertion {
    expected: "page".to_string(),
    found: "database".to_string(),
  };
  assert!(format!("{}", err).contains("expected `page`"));

  let err = Error::Api {
    status: 404,
    code: "object_not_found".to_string(),
    message: "Could not find page".to_string(),
  };
  assert_eq!(format!("{}", err), "API error (404): object_not_found: Could not find page");

  let err = Error::CompilerName("`X` is not a property of this database".to_string());
  assert!(format!("{}", err).starts_with("Unknown property in expression"));
}

#[test]
fn test_error_from_json() {
  let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
  let err: Error = json_err.into();
  match err {
    Error::Serialization(_) => {}
    _ => panic!("Expected Serialization error"),
  }
}
