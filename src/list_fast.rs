//! Cursor pagination.
//!
//! Retrieves large result sets without the expensive total-count query by
//! filtering on a monotonic identifier field. Each round packs 50 ID-filtered
//! sub-queries into one batch; sub-query *i* chains off sub-query *i-1*'s
//! last item through the server-side `$result[...]` reference, so the whole
//! round resolves in a single round-trip. The reference is a platform
//! templating syntax produced by string formatting here and never evaluated
//! client-side.

use crate::classify::batch_item_error;
use crate::client::Client;
use crate::command::{BatchCommands, MethodCall};
use crate::error::Result;
use serde_json::{json, Map, Value};

/// Options for [`Client::call_list_fast`].
#[derive(Debug, Clone)]
pub struct ListFastOptions {
    /// The identifier field used in `filter`/`order` keys. Defaults to `ID`.
    pub request_id_field: String,
    /// The identifier field read back from response items. Defaults to `ID`.
    pub response_id_field: String,
    /// Key the method nests its items under, e.g. `items` or `tasks`.
    pub wrapper_key: Option<String>,
    /// Sort and filter descending instead of ascending.
    pub descending: bool,
    /// Stop after exactly this many items.
    pub limit: Option<usize>,
}

impl ListFastOptions {
    /// Options with both identifier fields set to `ID`, ascending, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets both identifier fields.
    pub fn id_fields(mut self, request: impl Into<String>, response: impl Into<String>) -> Self {
        self.request_id_field = request.into();
        self.response_id_field = response.into();
        self
    }

    /// Sets the wrapper key items are nested under.
    pub fn wrapper_key(mut self, key: impl Into<String>) -> Self {
        self.wrapper_key = Some(key.into());
        self
    }

    /// Sorts and filters descending.
    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    /// Caps the number of items returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Default for ListFastOptions {
    fn default() -> Self {
        Self {
            request_id_field: "ID".into(),
            response_id_field: "ID".into(),
            wrapper_key: None,
            descending: false,
            limit: None,
        }
    }
}

impl Client {
    /// Retrieves every item of a list method via ID cursor rounds.
    ///
    /// Fully materialized and restartable. The output is strictly monotonic
    /// in the identifier field: ascending by default, descending with
    /// [`ListFastOptions::descending`]. Terminates when a sub-query returns a
    /// short page (data exhausted) or when `limit` items have been collected.
    pub async fn call_list_fast(
        &self,
        method: &str,
        params: Value,
        opts: &ListFastOptions,
    ) -> Result<Vec<Value>> {
        let page_size = self.config().page_size as usize;
        let order_direction = if opts.descending { "DESC" } else { "ASC" };
        let filter_key = format!(
            "{}{}",
            if opts.descending { "<" } else { ">" },
            opts.request_id_field
        );
        let wrapper_segment = opts
            .wrapper_key
            .as_deref()
            .map(|key| format!("[{key}]"))
            .unwrap_or_default();

        let mut items: Vec<Value> = Vec::new();
        let mut last_seen: Option<Value> = None;

        loop {
            let mut calls = Vec::with_capacity(page_size);
            for i in 0..page_size {
                let mut sub_params = params.clone();
                set_nested(
                    &mut sub_params,
                    "order",
                    &opts.request_id_field,
                    json!(order_direction),
                );
                // start = -1 suppresses the server's total-count computation.
                set_top(&mut sub_params, "start", json!(-1));

                if i == 0 {
                    if let Some(id) = &last_seen {
                        set_nested(&mut sub_params, "filter", &filter_key, id.clone());
                    }
                } else {
                    let chain = format!(
                        "$result[{}]{}[{}][{}]",
                        i - 1,
                        wrapper_segment,
                        page_size - 1,
                        opts.response_id_field
                    );
                    set_nested(&mut sub_params, "filter", &filter_key, json!(chain));
                }
                calls.push((i.to_string(), MethodCall::new(method, sub_params)));
            }

            let batch = self
                .call_batch(&BatchCommands::Labeled(calls), true, false)
                .await?;
            if let Some((label, payload)) = batch.first_error() {
                tracing::warn!(method, label, "cursor sub-query failed");
                return Err(batch_item_error(payload).into());
            }

            let mut exhausted = false;
            for (_, value) in &batch.result {
                let unwrapped = match &opts.wrapper_key {
                    Some(key) => value.get(key).unwrap_or(value),
                    None => value,
                };
                let sub_items = match unwrapped.as_array() {
                    Some(items) => items,
                    None => {
                        exhausted = true;
                        break;
                    }
                };

                for item in sub_items {
                    items.push(item.clone());
                    if let Some(limit) = opts.limit {
                        if items.len() >= limit {
                            items.truncate(limit);
                            return Ok(items);
                        }
                    }
                }

                // A short page means this round drained the data set.
                if sub_items.len() < page_size {
                    exhausted = true;
                    break;
                }
            }
            if exhausted {
                return Ok(items);
            }

            last_seen = items
                .last()
                .and_then(|item| item.get(&opts.response_id_field))
                .cloned();
            if last_seen.is_none() {
                tracing::warn!(
                    method,
                    id_field = %opts.response_id_field,
                    "identifier field missing from response items, stopping"
                );
                return Ok(items);
            }
            tracing::debug!(method, collected = items.len(), "starting next cursor round");
        }
    }
}

fn set_top(params: &mut Value, key: &str, value: Value) {
    if !params.is_object() {
        *params = Value::Object(Map::new());
    }
    if let Value::Object(map) = params {
        map.insert(key.to_string(), value);
    }
}

fn set_nested(params: &mut Value, outer: &str, key: &str, value: Value) {
    if !params.is_object() {
        *params = Value::Object(Map::new());
    }
    if let Value::Object(map) = params {
        let entry = map
            .entry(outer.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(nested) = entry {
            nested.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_nested_merges_with_existing_filter() {
        let mut params = json!({"filter": {"STAGE": "NEW"}});
        set_nested(&mut params, "filter", ">ID", json!(5));
        assert_eq!(params["filter"]["STAGE"], json!("NEW"));
        assert_eq!(params["filter"][">ID"], json!(5));
    }

    #[test]
    fn defaults_use_ascending_id_cursor() {
        let opts = ListFastOptions::new();
        assert_eq!(opts.request_id_field, "ID");
        assert_eq!(opts.response_id_field, "ID");
        assert!(!opts.descending);
        assert!(opts.limit.is_none());
    }
}
