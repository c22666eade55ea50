//! Method calls and batch command collections.
//!
//! A [`MethodCall`] is one logical operation awaiting execution. For batch
//! submission it serializes to `"<method>?<url-encoded params>"`, with nested
//! objects and arrays flattened PHP-style (`filter[>ID]=5`, `select[0]=ID`),
//! which is the shape the batch endpoint expects.

use serde_json::{Map, Value};

/// One logical operation: a method name plus a JSON object of parameters.
#[derive(Debug, Clone)]
pub struct MethodCall {
    /// The REST method, e.g. `crm.deal.list`.
    pub method: String,
    /// Parameters as a JSON object (`Value::Null` for none).
    pub params: Value,
}

impl MethodCall {
    /// Creates a method call. `params` should be a JSON object or `Null`.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Serializes for submission inside a batch `cmd` collection.
    pub fn to_command(&self) -> String {
        let query = encode_params(&self.params);
        if query.is_empty() {
            self.method.clone()
        } else {
            format!("{}?{}", self.method, query)
        }
    }
}

/// URL-encodes a JSON object with PHP-style bracket flattening.
pub(crate) fn encode_params(params: &Value) -> String {
    let mut pairs = Vec::new();
    flatten("", params, &mut pairs);
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}[{key}]")
                };
                flatten(&key, nested, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), nested, out);
            }
        }
        Value::Null if prefix.is_empty() => {}
        scalar => out.push((prefix.to_string(), scalar_to_string(scalar))),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Merges one extra key into a parameter object, leaving the original value
/// untouched. Used by the paginators to graft offsets and filters onto the
/// caller's parameters.
pub(crate) fn merge_param(params: &Value, key: &str, value: Value) -> Value {
    let mut map = match params {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// A collection of method calls for one batch submission.
///
/// Positional batches preserve ordering; labeled batches preserve the
/// caller-supplied labels.
#[derive(Debug, Clone)]
pub enum BatchCommands {
    /// Results come back as a sequence in submission order.
    Ordered(Vec<MethodCall>),
    /// Results come back keyed by the caller's labels.
    Labeled(Vec<(String, MethodCall)>),
}

impl BatchCommands {
    /// Number of commands in the collection.
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(calls) => calls.len(),
            Self::Labeled(calls) => calls.len(),
        }
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether results will come back keyed by caller labels.
    pub fn is_labeled(&self) -> bool {
        matches!(self, Self::Labeled(_))
    }

    /// The labels results will be keyed by: caller labels, or stringified
    /// positions for ordered batches.
    pub(crate) fn labels(&self) -> Vec<String> {
        match self {
            Self::Ordered(calls) => (0..calls.len()).map(|i| i.to_string()).collect(),
            Self::Labeled(calls) => calls.iter().map(|(label, _)| label.clone()).collect(),
        }
    }

    /// Returns the first label that appears twice, if any.
    pub(crate) fn duplicate_label(&self) -> Option<String> {
        if let Self::Labeled(calls) = self {
            let mut seen = std::collections::HashSet::new();
            for (label, _) in calls {
                if !seen.insert(label.as_str()) {
                    return Some(label.clone());
                }
            }
        }
        None
    }

    /// The `cmd` value submitted to the batch method, mirroring the
    /// collection's keying.
    pub(crate) fn cmd_value(&self) -> Value {
        match self {
            Self::Ordered(calls) => Value::Array(
                calls
                    .iter()
                    .map(|call| Value::String(call.to_command()))
                    .collect(),
            ),
            Self::Labeled(calls) => {
                let mut map = Map::new();
                for (label, call) in calls {
                    map.insert(label.clone(), Value::String(call.to_command()));
                }
                Value::Object(map)
            }
        }
    }

    /// Splits into consecutive chunks of at most `size` commands.
    pub(crate) fn chunks(&self, size: usize) -> Vec<BatchCommands> {
        match self {
            Self::Ordered(calls) => calls
                .chunks(size)
                .map(|chunk| Self::Ordered(chunk.to_vec()))
                .collect(),
            Self::Labeled(calls) => calls
                .chunks(size)
                .map(|chunk| Self::Labeled(chunk.to_vec()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_params_php_style() {
        let params = json!({
            "filter": { ">ID": 5, "STAGE": "NEW" },
            "select": ["ID", "TITLE"],
            "start": -1,
        });
        let encoded = encode_params(&params);
        assert!(encoded.contains("filter%5B%3EID%5D=5"));
        assert!(encoded.contains("filter%5BSTAGE%5D=NEW"));
        assert!(encoded.contains("select%5B0%5D=ID"));
        assert!(encoded.contains("select%5B1%5D=TITLE"));
        assert!(encoded.contains("start=-1"));
    }

    #[test]
    fn command_shape() {
        let call = MethodCall::new("crm.deal.get", json!({"id": 7}));
        assert_eq!(call.to_command(), "crm.deal.get?id=7");

        let bare = MethodCall::new("profile", Value::Null);
        assert_eq!(bare.to_command(), "profile");
    }

    #[test]
    fn merge_param_does_not_mutate_original() {
        let original = json!({"filter": {"ID": 1}});
        let merged = merge_param(&original, "start", json!(50));
        assert_eq!(merged["start"], json!(50));
        assert_eq!(merged["filter"], original["filter"]);
        assert!(original.get("start").is_none());
    }

    #[test]
    fn ordered_labels_are_positions() {
        let commands = BatchCommands::Ordered(vec![
            MethodCall::new("a", Value::Null),
            MethodCall::new("b", Value::Null),
        ]);
        assert_eq!(commands.labels(), vec!["0", "1"]);
        assert!(commands.duplicate_label().is_none());
    }

    #[test]
    fn duplicate_labels_are_detected() {
        let commands = BatchCommands::Labeled(vec![
            ("first".into(), MethodCall::new("a", Value::Null)),
            ("first".into(), MethodCall::new("b", Value::Null)),
        ]);
        assert_eq!(commands.duplicate_label(), Some("first".into()));
    }

    #[test]
    fn chunking_preserves_order() {
        let calls: Vec<_> = (0..120)
            .map(|i| MethodCall::new(format!("m{i}"), Value::Null))
            .collect();
        let chunks = BatchCommands::Ordered(calls).chunks(50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[1].len(), 50);
        assert_eq!(chunks[2].len(), 20);
        match &chunks[2] {
            BatchCommands::Ordered(calls) => assert_eq!(calls[0].method, "m100"),
            _ => unreachable!(),
        }
    }
}
