//! Pagination types
//!
//! A response body is classified into a [`PageShape`] before its records are
//! taken, so unexpected envelopes fail loudly instead of being guessed at.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

/// How a response body carries its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// Object with an `items` array
    Items,
    /// Body is itself an array
    Bare,
    /// Any other object; the body is one record
    Singleton,
}

impl PageShape {
    /// Classify a response body
    ///
    /// An `items` key holding `null` is treated as absent. Scalars, and
    /// `items` holding anything else that is not an array, are rejected.
    pub fn classify(body: &Value) -> Result<Self> {
        match body {
            Value::Array(_) => Ok(PageShape::Bare),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(_)) => Ok(PageShape::Items),
                None | Some(Value::Null) => Ok(PageShape::Singleton),
                Some(other) => Err(Error::pagination(format!(
                    "`items` is {}, expected an array",
                    json_kind(other)
                ))),
            },
            other => Err(Error::pagination(format!(
                "response body is {}, expected an object or array",
                json_kind(other)
            ))),
        }
    }
}

/// Continuation URL taken from a response envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    /// Read `paging.next`, falling back to `links.next`
    ///
    /// Empty strings and non-string values mean there is no next page.
    pub fn from_body(body: &Value) -> Option<Self> {
        ["paging", "links"].iter().find_map(|envelope| {
            body.get(envelope)
                .and_then(|e| e.get("next"))
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(|next| PageCursor(next.to_string()))
        })
    }

    /// Cursor URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the URL
    pub fn into_url(self) -> String {
        self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One interpreted response
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Shape the body was classified as
    pub shape: PageShape,
    /// Records carried by the page, in response order
    pub records: Vec<Value>,
    /// Next page, if any
    pub next: Option<PageCursor>,
}

impl Page {
    /// Interpret a response body, taking ownership of its records
    pub fn from_body(mut body: Value) -> Result<Self> {
        let shape = PageShape::classify(&body)?;
        let next = PageCursor::from_body(&body);

        let records = match shape {
            PageShape::Items => match body.get_mut("items").map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            PageShape::Bare => match body {
                Value::Array(items) => items,
                _ => Vec::new(),
            },
            PageShape::Singleton => vec![body],
        };

        Ok(Self {
            shape,
            records,
            next,
        })
    }

    /// A list page with nothing in it
    pub fn is_empty_list(&self) -> bool {
        self.shape != PageShape::Singleton && self.records.is_empty()
    }
}

/// Loop guards for a pagination run
///
/// By default only a missing next link (or one that repeats the current
/// page) ends a run. `stop_on_empty_page` is for APIs that keep linking
/// onward past the last record.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    /// Stop when a list page comes back empty even if it links onward
    pub stop_on_empty_page: bool,
    /// Log progress every this many pages
    pub progress_interval: usize,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            stop_on_empty_page: false,
            progress_interval: 10,
        }
    }
}

impl PaginatorConfig {
    #[must_use]
    pub fn with_stop_on_empty_page(mut self, stop: bool) -> Self {
        self.stop_on_empty_page = stop;
        self
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
