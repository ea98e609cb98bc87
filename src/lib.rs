//! Notionizer: a client object model for the Notion API
//!
//! Databases and pages fetched through one [`Notion`] session are live
//! objects: every handle for an id shares one cache entry, assignments go
//! through the server, and partial responses are merged into what is already
//! known. Database queries are written as small boolean expressions and come
//! back as a lazy sequence that follows pagination cursors.
//!
//! # Example
//!
//! ```no_run
//! use notionizer::{Notion, RemoteObject};
//! use serde_json::json;
//!
//! fn main() -> notionizer::Result<()> {
//!     let notion = Notion::new("secret_token")?;
//!     let db = notion.get_database("https://www.notion.so/44d6b8fda2734f04968a771a79f97fb6")?;
//!     println!("{}", db.title());
//!
//!     // Create a page; values are checked against the schema first
//!     let page = db.create_page(&json!({"Title": "TitleFixed1", "Number": 2}))?;
//!
//!     // Query with an expression
//!     for page in db.query(r#"Title == "TitleFixed1" or Number > 2"#)? {
//!         let page = page?;
//!         println!("{} {:?}", page.title(), page.property("Number"));
//!     }
//!
//!     // Writes go through the server; every handle observes the result
//!     page.set("icon", json!({"type": "emoji", "emoji": "📘"}))?;
//!     page.set_property("Number", &json!(3))?;
//!
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod cache;
mod client;
pub mod compile;
mod database;
mod error;
pub mod lexer;
mod object;
mod page;
mod pagination;
pub mod parser;
pub mod property;
pub mod protocol;
pub mod query;
pub mod transport;

pub use access::{Access, Compound, Container, FieldDef};
pub use cache::{Entry, IdentityCache, Snapshot};
pub use client::{ClientOptions, Notion};
pub use compile::compile;
pub use database::{Database, DatabaseSchema, PropertyDef};
pub use error::{Error, Result};
pub use object::{Handle, RemoteObject};
pub use page::Page;
pub use pagination::QueriedPages;
pub use property::{FormulaType, PropertyType};
pub use protocol::{ObjectId, ObjectKind, QueryResponse, MAX_PAGE_SIZE, NOTION_VERSION};
pub use query::{Condition, FilterNode, QueryBuilder, QueryPayload, Sort, SortDirection, Timestamp};
pub use transport::{HttpTransport, ResponseMeta, Transport};
