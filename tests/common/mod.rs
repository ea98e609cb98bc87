//! Scripted transport and record fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use notionizer::{Error, Notion, ResponseMeta, Result, Transport};
use serde_json::{json, Value};

pub const DB_ID: &str = "44d6b8fd-a273-4f04-968a-771a79f97fb6";
pub const DB_COMPACT_ID: &str = "44d6b8fda2734f04968a771a79f97fb6";

/// One request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub method: &'static str,
  pub path: String,
  pub payload: Option<Value>,
}

/// Replays queued responses in order and records every call.
///
/// A call with nothing queued fails with a 500 `Error::Api`.
#[derive(Default)]
pub struct MockTransport {
  responses: Mutex<VecDeque<Result<Value>>>,
  calls: Mutex<Vec<Call>>,
}

impl MockTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn respond(&self, body: Value) {
    self.responses.lock().unwrap().push_back(Ok(body));
  }

  pub fn fail(&self, error: Error) {
    self.responses.lock().unwrap().push_back(Err(error));
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn last_call(&self) -> Call {
    self.calls().pop().expect("no calls recorded")
  }

  fn reply(&self, method: &'static str, path: &str, payload: Option<&Value>) -> Result<(ResponseMeta, Value)> {
    self.calls.lock().unwrap().push(Call {
      method,
      path: path.to_string(),
      payload: payload.cloned(),
    });
    let next = self.responses.lock().unwrap().pop_front();
    match next {
      Some(Ok(body)) => Ok((
        ResponseMeta {
          status: 200,
          request_id: None,
        },
        body,
      )),
      Some(Err(e)) => Err(e),
      None => Err(Error::Api {
        status: 500,
        code: "no_response".to_string(),
        message: format!("nothing queued for {} {}", method, path),
      }),
    }
  }
}

impl Transport for MockTransport {
  fn get(&self, path: &str) -> Result<(ResponseMeta, Value)> {
    self.reply("GET", path, None)
  }

  fn post(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)> {
    self.reply("POST", path, Some(payload))
  }

  fn patch(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)> {
    self.reply("PATCH", path, Some(payload))
  }
}

pub fn session() -> (Notion, Arc<MockTransport>) {
  let mock = MockTransport::new();
  (Notion::with_transport(mock.clone()), mock)
}

pub fn page_id(n: u32) -> String {
  format!("00000000-0000-4000-8000-{:012}", n)
}

pub fn database_record() -> Value {
  json!({
    "object": "database",
    "id": DB_ID,
    "created_time": "2022-03-20T10:00:00.000Z",
    "title": [{"type": "text", "text": {"content": "Test DB"}, "plain_text": "Test DB"}],
    "icon": null,
    "url": format!("https://www.notion.so/{}", DB_COMPACT_ID),
    "properties": {
      "Title": {"id": "title", "name": "Title", "type": "title", "title": {}},
      "Number": {"id": "n%3F", "name": "Number", "type": "number", "number": {"format": "number"}},
      "Checkbox": {"id": "c%3F", "name": "Checkbox", "type": "checkbox", "checkbox": {}},
      "Kind": {"id": "k%3F", "name": "Kind", "type": "select", "select": {"options": []}},
      "Tags": {"id": "t%3F", "name": "Tags", "type": "multi_select", "multi_select": {"options": []}},
      "Due date": {"id": "d%3F", "name": "Due date", "type": "date", "date": {}},
      "Total": {"id": "f%3F", "name": "Total", "type": "formula", "formula": {"expression": "prop(\"Number\") * 2"}},
      "Created": {"id": "r%3F", "name": "Created", "type": "created_time", "created_time": {}}
    }
  })
}

pub fn page_record(n: u32, title: &str, number: i64) -> Value {
  json!({
    "object": "page",
    "id": page_id(n),
    "archived": false,
    "icon": null,
    "parent": {"type": "database_id", "database_id": DB_ID},
    "properties": {
      "Title": {"id": "title", "type": "title", "title": [
        {"type": "text", "text": {"content": title}, "plain_text": title}
      ]},
      "Number": {"id": "n%3F", "type": "number", "number": number},
      "Checkbox": {"id": "c%3F", "type": "checkbox", "checkbox": false},
      "Tags": {"id": "t%3F", "type": "multi_select", "multi_select": [{"name": "a"}]},
      "Total": {"id": "f%3F", "type": "formula", "formula": {"type": "number", "number": number * 2}}
    }
  })
}

/// One query batch holding pages `range`, continued by `next_cursor`.
pub fn query_batch(range: std::ops::Range<u32>, next_cursor: Option<&str>) -> Value {
  let results: Vec<Value> = range.map(|n| page_record(n, &format!("Page {}", n), n as i64)).collect();
  json!({
    "object": "list",
    "results": results,
    "next_cursor": next_cursor,
    "has_more": next_cursor.is_some(),
  })
}

/// Session holding the fixture database, with the GET already consumed.
pub fn database_session() -> (Notion, Arc<MockTransport>, notionizer::Database) {
  let (notion, mock) = session();
  mock.respond(database_record());
  let db = notion.get_database(DB_COMPACT_ID).expect("fixture database");
  (notion, mock, db)
}
