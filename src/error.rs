//! Error types for the notionizer client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Schema assertion failed: expected `{expected}` record, found `{found}`")]
  SchemaAssertion { expected: String, found: String },

  #[error("Property access error: {0}")]
  PropertyAccess(String),

  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Unknown property in expression: {0}")]
  CompilerName(String),

  #[error("Invalid query expression: {0}")]
  CompilerSyntax(String),

  #[error("Invalid object id: {0}")]
  InvalidId(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API error ({status}): {code}: {message}")]
  Api {
    status: u16,
    code: String,
    message: String,
  },

  #[error("Serialization error: {0}")]
  Serialization(String),
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
