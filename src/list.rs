//! Offset pagination.
//!
//! One initial call reveals `next` and `total`; the remaining pages are
//! fetched as offset-shifted copies of the original call, packed through the
//! chunked batch path so up to 50 pages travel per round-trip.

use crate::classify::batch_item_error;
use crate::client::Client;
use crate::command::{merge_param, BatchCommands, MethodCall};
use crate::envelope::unwrap_items;
use crate::error::Result;
use serde_json::{json, Value};

impl Client {
    /// Retrieves every item of a paginated list method.
    ///
    /// Fully materialized and restartable: each invocation starts from the
    /// first page. The paginated calls run halted, so the first per-page
    /// error surfaces as its classified [`Error`](crate::Error).
    pub async fn call_list(&self, method: &str, params: Value) -> Result<Vec<Value>> {
        let envelope = self.call(method, params.clone()).await?;
        let mut items = envelope.list_items();

        let (Some(next), Some(total)) = (envelope.next, envelope.total) else {
            return Ok(items);
        };
        if next == 0 {
            return Ok(items);
        }

        let page_size = self.config().page_size;
        let mut calls = Vec::new();
        let mut offset = next;
        while offset < total {
            calls.push(MethodCall::new(
                method,
                merge_param(&params, "start", json!(offset)),
            ));
            offset += page_size;
        }
        if calls.is_empty() {
            return Ok(items);
        }

        tracing::debug!(method, total, pages = calls.len(), "paginating by offset");
        let batch = self.call_batches(&BatchCommands::Ordered(calls), true).await?;
        if let Some((label, payload)) = batch.first_error() {
            tracing::warn!(method, label, "offset page failed");
            return Err(batch_item_error(payload).into());
        }
        for (_, value) in &batch.result {
            items.extend(unwrap_items(value));
        }
        Ok(items)
    }
}
