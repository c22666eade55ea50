//! Parsed response envelopes.
//!
//! [`ApiEnvelope`] is the success payload of one logical call; it is created
//! by the classifier and never mutated afterwards. [`BatchEnvelope`] is the
//! batch method's nested result, re-keyed by the submitted commands' labels
//! in submission order.

use crate::command::BatchCommands;
use crate::error::{Error, Result};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timing and throttling metadata attached to every successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Wall-clock start of server-side processing (Unix seconds, fractional).
    pub start: f64,
    /// Wall-clock finish of server-side processing.
    pub finish: f64,
    /// `finish - start`.
    pub duration: f64,
    /// CPU time actually spent on the request.
    pub processing: f64,
    /// ISO-8601 rendering of `start`.
    pub date_start: String,
    /// ISO-8601 rendering of `finish`.
    pub date_finish: String,
    /// Accumulated heavy-method time within the throttling window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating: Option<f64>,
    /// When the throttling window resets (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_reset_at: Option<u64>,
}

impl TimeInfo {
    /// Folds a later chunk's timing into this one: durations are summed,
    /// start fields keep the first chunk's values, finish and throttling
    /// fields take the last chunk's.
    pub(crate) fn absorb(&mut self, next: &TimeInfo) {
        self.duration += next.duration;
        self.processing += next.processing;
        self.finish = next.finish;
        self.date_finish = next.date_finish.clone();
        self.operating = next.operating;
        self.operating_reset_at = next.operating_reset_at;
    }
}

/// The parsed success payload of one logical call.
///
/// `next` and `total` are only present on paginated list responses; absent
/// fields stay absent when the envelope is re-serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// The method's result, shape depends on the method.
    pub result: Value,
    /// Server-side timing for the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeInfo>,
    /// Offset of the next page, when more results exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    /// Total number of matching items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl ApiEnvelope {
    /// Unwraps a list result into a flat item sequence. List methods return
    /// either a bare array or an array nested one level under a single
    /// resource key (`{"tasks": [...]}`).
    pub fn list_items(&self) -> Vec<Value> {
        unwrap_items(&self.result)
    }
}

pub(crate) fn unwrap_items(result: &Value) -> Vec<Value> {
    match result {
        Value::Array(items) => items.clone(),
        Value::Object(map) if map.len() == 1 => match map.values().next() {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![result.clone()],
        },
        other => vec![other.clone()],
    }
}

/// The merged result of one or more batch calls.
///
/// Each section mirrors the submitted batch's keying: caller labels for
/// labeled batches, stringified positions for ordered ones. Entries are kept
/// in submission order. `result_error` only holds entries for commands that
/// failed, so with `halt=false` a single envelope can mix successes and
/// per-command failures.
#[derive(Debug, Clone, Default)]
pub struct BatchEnvelope {
    /// Whether entries are keyed by caller labels.
    pub labeled: bool,
    /// Per-command results.
    pub result: Vec<(String, Value)>,
    /// Per-command error payloads.
    pub result_error: Vec<(String, Value)>,
    /// Per-command totals, for commands that paginate.
    pub result_total: Vec<(String, u64)>,
    /// Per-command next offsets.
    pub result_next: Vec<(String, u64)>,
    /// Per-command timing.
    pub result_time: Vec<(String, TimeInfo)>,
    /// Aggregate timing across the whole batch (summed over chunks).
    pub time: Option<TimeInfo>,
}

impl BatchEnvelope {
    pub(crate) fn empty(labeled: bool) -> Self {
        Self {
            labeled,
            ..Self::default()
        }
    }

    /// Re-keys the batch method's nested envelope by the submitted labels.
    pub(crate) fn from_envelope(envelope: &ApiEnvelope, commands: &BatchCommands) -> Result<Self> {
        let sections = envelope.result.as_object().ok_or_else(|| Error::Decode {
            status: StatusCode::OK,
            raw_body: envelope.result.to_string(),
            reason: "batch result is not an object".into(),
        })?;

        let labels = commands.labels();
        let mut parsed = Self::empty(commands.is_labeled());
        for (index, label) in labels.iter().enumerate() {
            if let Some(value) = keyed_entry(sections.get("result"), label, index) {
                parsed.result.push((label.clone(), value.clone()));
            }
            if let Some(value) = keyed_entry(sections.get("result_error"), label, index) {
                parsed.result_error.push((label.clone(), value.clone()));
            }
            if let Some(total) =
                keyed_entry(sections.get("result_total"), label, index).and_then(Value::as_u64)
            {
                parsed.result_total.push((label.clone(), total));
            }
            if let Some(next) =
                keyed_entry(sections.get("result_next"), label, index).and_then(Value::as_u64)
            {
                parsed.result_next.push((label.clone(), next));
            }
            if let Some(time) = keyed_entry(sections.get("result_time"), label, index)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
            {
                parsed.result_time.push((label.clone(), time));
            }
        }
        parsed.time = envelope.time.clone();
        Ok(parsed)
    }

    /// Folds a later chunk into this envelope. Labeled chunks union their
    /// entries (labels are disjoint by construction); ordered chunks are
    /// relabeled to global positions and concatenated. `offset` is the
    /// number of commands in all earlier chunks.
    pub(crate) fn absorb(&mut self, chunk: BatchEnvelope, offset: usize) {
        let relabel = |label: &str| -> String {
            if self.labeled {
                label.to_string()
            } else {
                match label.parse::<usize>() {
                    Ok(index) => (offset + index).to_string(),
                    Err(_) => label.to_string(),
                }
            }
        };

        for (label, value) in chunk.result {
            self.result.push((relabel(&label), value));
        }
        for (label, value) in chunk.result_error {
            self.result_error.push((relabel(&label), value));
        }
        for (label, value) in chunk.result_total {
            self.result_total.push((relabel(&label), value));
        }
        for (label, value) in chunk.result_next {
            self.result_next.push((relabel(&label), value));
        }
        for (label, value) in chunk.result_time {
            self.result_time.push((relabel(&label), value));
        }

        match (&mut self.time, chunk.time) {
            (Some(acc), Some(next)) => acc.absorb(&next),
            (acc @ None, next) => *acc = next,
            _ => {}
        }
    }

    /// Looks up a command's result by label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.result
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    /// Looks up a command's error payload by label.
    pub fn error(&self, label: &str) -> Option<&Value> {
        self.result_error
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    /// Whether any command in the batch failed.
    pub fn has_errors(&self) -> bool {
        !self.result_error.is_empty()
    }

    /// The first per-command error in submission order.
    pub fn first_error(&self) -> Option<(&str, &Value)> {
        self.result_error
            .first()
            .map(|(label, value)| (label.as_str(), value))
    }
}

fn keyed_entry<'a>(section: Option<&'a Value>, label: &str, index: usize) -> Option<&'a Value> {
    match section? {
        Value::Object(map) => map.get(label),
        Value::Array(items) => items.get(index),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MethodCall;
    use serde_json::json;

    fn time(start: f64, finish: f64, duration: f64) -> TimeInfo {
        TimeInfo {
            start,
            finish,
            duration,
            processing: duration / 2.0,
            date_start: format!("{start}"),
            date_finish: format!("{finish}"),
            operating: None,
            operating_reset_at: None,
        }
    }

    #[test]
    fn envelope_preserves_absent_pagination_keys() {
        let body = json!({"result": [], "time": {
            "start": 1.0, "finish": 2.0, "duration": 1.0, "processing": 0.5,
            "date_start": "a", "date_finish": "b"
        }});
        let envelope: ApiEnvelope = serde_json::from_value(body.clone()).unwrap();
        assert!(envelope.next.is_none());
        assert!(envelope.total.is_none());

        // Re-serializing reproduces the same key set, nothing spurious.
        let round_tripped = serde_json::to_value(&envelope).unwrap();
        assert_eq!(round_tripped, body);
    }

    #[test]
    fn unwraps_single_resource_key() {
        assert_eq!(
            unwrap_items(&json!({"tasks": [1, 2, 3]})),
            vec![json!(1), json!(2), json!(3)]
        );
        assert_eq!(unwrap_items(&json!([4, 5])), vec![json!(4), json!(5)]);
        // Multi-key objects are a single item, not a nested list.
        assert_eq!(
            unwrap_items(&json!({"a": 1, "b": 2})),
            vec![json!({"a": 1, "b": 2})]
        );
    }

    #[test]
    fn batch_envelope_keyed_by_submitted_labels() {
        let envelope = ApiEnvelope {
            result: json!({
                "result": {"one": [1], "two": [2]},
                "result_error": {"two": {"error": "ACCESS_DENIED", "error_description": "no"}},
                "result_total": {"one": 10},
                "result_next": {"one": 1},
                "result_time": {},
            }),
            time: None,
            next: None,
            total: None,
        };
        let commands = BatchCommands::Labeled(vec![
            ("one".into(), MethodCall::new("a", Value::Null)),
            ("two".into(), MethodCall::new("b", Value::Null)),
        ]);
        let batch = BatchEnvelope::from_envelope(&envelope, &commands).unwrap();
        assert!(batch.labeled);
        assert_eq!(batch.get("one"), Some(&json!([1])));
        assert!(batch.error("two").is_some());
        assert_eq!(batch.result_total, vec![("one".to_string(), 10)]);
        assert_eq!(batch.first_error().map(|(l, _)| l), Some("two"));
    }

    #[test]
    fn batch_envelope_positional_sections() {
        let envelope = ApiEnvelope {
            result: json!({
                "result": [[1], [2]],
                "result_error": [],
                "result_total": [],
                "result_next": [],
                "result_time": [],
            }),
            time: None,
            next: None,
            total: None,
        };
        let commands = BatchCommands::Ordered(vec![
            MethodCall::new("a", Value::Null),
            MethodCall::new("b", Value::Null),
        ]);
        let batch = BatchEnvelope::from_envelope(&envelope, &commands).unwrap();
        assert!(!batch.labeled);
        assert_eq!(batch.get("0"), Some(&json!([1])));
        assert_eq!(batch.get("1"), Some(&json!([2])));
        assert!(!batch.has_errors());
    }

    #[test]
    fn absorb_unions_labeled_chunks() {
        let mut first = BatchEnvelope::empty(true);
        for i in 0..50 {
            first.result.push((format!("c{i}"), json!(i)));
        }
        first.time = Some(time(1.0, 2.0, 1.0));

        let mut second = BatchEnvelope::empty(true);
        for i in 50..60 {
            second.result.push((format!("c{i}"), json!(i)));
        }
        second.time = Some(time(2.0, 4.0, 2.0));

        first.absorb(second, 50);
        assert_eq!(first.result.len(), 60);
        let merged = first.time.unwrap();
        assert_eq!(merged.duration, 3.0);
        assert_eq!(merged.start, 1.0);
        assert_eq!(merged.finish, 4.0);
        assert_eq!(merged.date_finish, "4");
    }

    #[test]
    fn absorb_renumbers_ordered_chunks() {
        let mut first = BatchEnvelope::empty(false);
        first.result.push(("0".into(), json!("a")));
        first.result.push(("1".into(), json!("b")));

        let mut second = BatchEnvelope::empty(false);
        second.result.push(("0".into(), json!("c")));
        second
            .result_error
            .push(("1".into(), json!({"error": "X"})));

        first.absorb(second, 2);
        assert_eq!(first.get("2"), Some(&json!("c")));
        assert!(first.error("3").is_some());
    }
}
