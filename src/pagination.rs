//! Lazy, cursor-following result sequence for database queries.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Notion;
use crate::error::Result;
use crate::page::Page;
use crate::protocol::{ObjectKind, QueryResponse};
use crate::query::QueryPayload;

/// Pages matching a query, fetched one batch at a time.
///
/// The first batch is requested when the sequence is created. Later batches
/// are requested from inside [`next`](Iterator::next) once the buffered batch
/// runs out and the server reported more results. Every record is resolved
/// through the session's identity cache as a fresh registration.
///
/// The sequence ends after the first error.
pub struct QueriedPages {
  client: Notion,
  path: String,
  payload: QueryPayload,
  batch: VecDeque<Value>,
  next_cursor: Option<String>,
  has_more: bool,
  requests: usize,
  done: bool,
}

impl QueriedPages {
  /// Issues the first request for `payload` against `path`.
  pub fn new(client: Notion, path: String, payload: QueryPayload) -> Result<Self> {
    let mut pages = Self {
      client,
      path,
      payload,
      batch: VecDeque::new(),
      next_cursor: None,
      has_more: false,
      requests: 0,
      done: false,
    };
    pages.fetch(None)?;
    Ok(pages)
  }

  /// Starts over from the first batch, re-issuing the initial request.
  ///
  /// Buffered records of the current batch are discarded. Objects already
  /// yielded stay valid; the replayed records are registered again.
  pub fn rewind(&mut self) -> Result<()> {
    self.done = false;
    if let Err(e) = self.fetch(None) {
      self.done = true;
      return Err(e);
    }
    Ok(())
  }

  /// Requests issued so far, including the first one.
  pub fn requests(&self) -> usize {
    self.requests
  }

  /// Records received but not yet yielded.
  pub fn buffered(&self) -> usize {
    self.batch.len()
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub fn next_cursor(&self) -> Option<&str> {
    self.next_cursor.as_deref()
  }

  pub fn payload(&self) -> &QueryPayload {
    &self.payload
  }

  fn fetch(&mut self, cursor: Option<String>) -> Result<()> {
    self.payload.start_cursor = cursor;
    let body = serde_json::to_value(&self.payload)?;
    let (meta, response) = self.client.transport().post(&self.path, &body)?;
    let response: QueryResponse = serde_json::from_value(response)?;
    self.requests += 1;

    debug!(
      path = %self.path,
      cursor = ?self.payload.start_cursor,
      results = response.results.len(),
      has_more = response.has_more,
      request_id = ?meta.request_id,
      "fetched query batch"
    );

    self.batch = response.results.into();
    self.next_cursor = response.next_cursor;
    self.has_more = response.has_more;
    Ok(())
  }
}

impl Iterator for QueriedPages {
  type Item = Result<Page>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if self.done {
        return None;
      }

      if let Some(record) = self.batch.pop_front() {
        let page = self
          .client
          .cache()
          .register(ObjectKind::Page, record)
          .map(|entry| Page::from_entry(self.client.clone(), entry));
        if page.is_err() {
          self.done = true;
        }
        return Some(page);
      }

      if !self.has_more {
        self.done = true;
        return None;
      }

      let Some(cursor) = self.next_cursor.take() else {
        warn!(path = %self.path, "query reported more results without a cursor");
        self.done = true;
        return None;
      };

      if let Err(e) = self.fetch(Some(cursor)) {
        self.done = true;
        return Some(Err(e));
      }
    }
  }
}

impl FusedIterator for QueriedPages {}
