//! Page-following loop

use super::types::{Page, PaginatorConfig};
use crate::error::Result;
use crate::http::HttpClient;
use serde_json::Value;
use tracing::{debug, info};

/// Follows `next` links until the collection is exhausted
///
/// Pages are fetched strictly one after another through the shared client,
/// so every request is rate gated and retried. A failure on any page fails
/// the whole run; no partial collection is returned.
#[derive(Debug, Clone)]
pub struct Paginator {
    client: HttpClient,
    config: PaginatorConfig,
}

impl Paginator {
    /// Create a paginator with default loop guards
    pub fn new(client: HttpClient) -> Self {
        Self::with_config(client, PaginatorConfig::default())
    }

    /// Create a paginator with explicit loop guards
    pub fn with_config(client: HttpClient, config: PaginatorConfig) -> Self {
        Self { client, config }
    }

    /// Underlying client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Collect every record reachable from `start_url`, in page order
    pub async fn fetch_all(&self, start_url: &str) -> Result<Vec<Value>> {
        self.fetch_all_with(start_url, |record| vec![record]).await
    }

    /// Like [`fetch_all`](Self::fetch_all), expanding each page record with
    /// `unwrap` first
    ///
    /// Used for endpoints that nest their list inside a singleton envelope.
    /// A page that expands to nothing counts as empty.
    pub async fn fetch_all_with<F>(&self, start_url: &str, mut unwrap: F) -> Result<Vec<Value>>
    where
        F: FnMut(Value) -> Vec<Value>,
    {
        let mut records = Vec::new();
        let mut current = self.client.build_url(start_url);
        let mut pages = 0usize;

        loop {
            debug!("Fetching page {}: {}", pages + 1, current);
            let body = self.client.fetch_json(&current).await?;
            let page = Page::from_body(body)?;
            pages += 1;

            let before = records.len();
            for record in page.records {
                records.extend(unwrap(record));
            }
            let empty = records.len() == before;

            if self.config.progress_interval > 0 && pages % self.config.progress_interval == 0 {
                info!(
                    "Processed {} pages, collected {} items",
                    pages,
                    records.len()
                );
            }

            let Some(next) = page.next else {
                break;
            };
            if empty && self.config.stop_on_empty_page {
                debug!("Empty page with a next link, stopping");
                break;
            }
            if next.as_str() == current {
                debug!("Next link repeats the current page, stopping");
                break;
            }
            current = next.into_url();
        }

        info!("Completed: {} pages, {} total items", pages, records.len());
        Ok(records)
    }
}
