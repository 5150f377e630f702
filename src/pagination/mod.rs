//! Pagination module
//!
//! Follows Mailgun's continuation links (`paging.next`, or `links.next` on
//! some endpoints) and accumulates every record into one ordered collection.
//!
//! # Overview
//!
//! Each response is classified as an `items` envelope, a bare array, or a
//! single object. The paginator stops when no next link is present or when
//! the next link points back at the page just fetched. Stopping on an empty
//! list page is opt-in through `PaginatorConfig`.

mod paginator;
mod types;

pub use paginator::Paginator;
pub use types::{Page, PageCursor, PageShape, PaginatorConfig};
