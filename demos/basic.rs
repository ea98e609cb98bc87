//! Basic usage of the notionizer client.
//!
//! Run with `NOTION_TOKEN=secret_... cargo run --example basic -- <database id or url>`.

use notionizer::{ClientOptions, Notion, RemoteObject, SortDirection};
use serde_json::json;

fn main() -> notionizer::Result<()> {
  let database_id = std::env::args()
    .nth(1)
    .ok_or_else(|| notionizer::Error::Config("usage: basic <database id or url>".to_string()))?;

  let notion = Notion::with_options(ClientOptions::from_env()?)?;
  let db = notion.get_database(&database_id)?;
  println!("Database: {} ({})", db.title(), db.id());

  let schema = db.schema()?;
  for property in schema.iter() {
    println!("  {:<20} {}", property.name, property.kind);
  }

  // Create a page, if the database has the columns this demo expects
  if let (Some(title), Some(_)) = (schema.title_property(), schema.get("Number")) {
    let mut properties = serde_json::Map::new();
    properties.insert(title.name.clone(), json!("Created by notionizer"));
    properties.insert("Number".to_string(), json!(2));
    let page = db.create_page(&serde_json::Value::Object(properties))?;
    println!("Created page {}", page.id());
  }

  // Query pages
  let expression = std::env::args().nth(2).unwrap_or_default();
  let pages = db
    .query_builder()
    .filter(expression)
    .sort_by_timestamp(notionizer::Timestamp::CreatedTime, SortDirection::Descending)
    .page_size(50)
    .run()?
    .collect::<notionizer::Result<Vec<_>>>()?;

  for row in db.table(&pages, &[], true)? {
    let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
    println!("{}", cells.join(" | "));
  }

  println!("{} objects cached", notion.cache().len());
  Ok(())
}
