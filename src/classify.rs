//! Response classification.
//!
//! Turns a raw response into an [`ApiEnvelope`] or a typed error. Two
//! mutually exclusive error taxonomies apply to parsed bodies: the structured
//! `{error: {code, message, validation?}}` shape and the legacy flat
//! `{error, error_description}` shape. Bodies that are not JSON at all become
//! decode errors specialized by the originating HTTP status.

use crate::envelope::ApiEnvelope;
use crate::error::{ApiError, ApiErrorKind, Error, ErrorRecord, Result};
use crate::transport::RawResponse;
use http::StatusCode;
use serde_json::Value;

pub(crate) fn classify(raw: RawResponse) -> Result<ApiEnvelope> {
    let RawResponse {
        status,
        location,
        body,
    } = raw;

    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return Err(undecodable(status, location, body, e)),
    };

    match value.get("error") {
        // Structured shape: {error: {code, message, validation?}}.
        Some(Value::Object(detail)) => {
            let code = detail
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let description = detail
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(ApiError {
                kind: ApiErrorKind::from_structured(status, &code),
                record: ErrorRecord {
                    http_status: Some(status),
                    code,
                    description,
                },
                validation: detail.get("validation").cloned(),
                raw_body: body,
            }
            .into());
        }
        // Legacy flat shape: {error: "CODE", error_description: "..."}.
        Some(Value::String(code)) => {
            let code = code.to_ascii_uppercase();
            let description = value
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let kind = ApiErrorKind::from_code(&code)
                .or_else(|| ApiErrorKind::from_status(status))
                .unwrap_or(ApiErrorKind::Other);
            return Err(ApiError {
                kind,
                record: ErrorRecord {
                    http_status: Some(status),
                    code,
                    description,
                },
                validation: None,
                raw_body: body,
            }
            .into());
        }
        _ => {}
    }

    if !status.is_success() {
        // Parseable body, non-success status, no error indicator.
        let kind = ApiErrorKind::from_status(status).unwrap_or(ApiErrorKind::Other);
        return Err(ApiError {
            kind,
            record: ErrorRecord {
                http_status: Some(status),
                code: String::new(),
                description: String::new(),
            },
            validation: None,
            raw_body: body,
        }
        .into());
    }

    serde_json::from_value(value).map_err(|e| Error::Decode {
        status,
        raw_body: body,
        reason: e.to_string(),
    })
}

fn undecodable(
    status: StatusCode,
    location: Option<String>,
    raw_body: String,
    parse_error: serde_json::Error,
) -> Error {
    if status.is_redirection() {
        Error::RedirectedResponse {
            status,
            location,
            raw_body,
        }
    } else if status == StatusCode::FORBIDDEN {
        Error::ForbiddenResponse { raw_body }
    } else if status.is_server_error() {
        Error::ServerErrorResponse { status, raw_body }
    } else {
        Error::Decode {
            status,
            raw_body,
            reason: parse_error.to_string(),
        }
    }
}

/// Classifies one per-command error payload from a batch `result_error`
/// section. These carry no HTTP status of their own.
pub(crate) fn batch_item_error(payload: &Value) -> ApiError {
    let code = payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_uppercase();
    let description = payload
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ApiError {
        kind: ApiErrorKind::from_code(&code).unwrap_or(ApiErrorKind::Other),
        record: ErrorRecord {
            http_status: None,
            code,
            description,
        },
        validation: None,
        raw_body: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            location: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn success_passes_through_unchanged() {
        let envelope = classify(raw(
            200,
            r#"{"result": {"ID": "1"}, "time": {"start": 1.0, "finish": 2.0,
                "duration": 1.0, "processing": 0.1, "date_start": "a",
                "date_finish": "b"}, "next": 50, "total": 120}"#,
        ))
        .unwrap();
        assert_eq!(envelope.next, Some(50));
        assert_eq!(envelope.total, Some(120));
    }

    #[test]
    fn legacy_shape_resolves_through_code_table() {
        let err = classify(raw(
            401,
            r#"{"error": "expired_token", "error_description": "expired"}"#,
        ))
        .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::ExpiredToken));
        match err {
            Error::Api(api) => {
                assert_eq!(api.record.code, "EXPIRED_TOKEN");
                assert_eq!(api.record.http_status, Some(StatusCode::UNAUTHORIZED));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn legacy_shape_falls_back_to_status_table() {
        let err = classify(raw(
            429,
            r#"{"error": "SOME_NEW_CODE", "error_description": "slow down"}"#,
        ))
        .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::TooManyRequests));
    }

    #[test]
    fn legacy_shape_falls_back_to_other() {
        let err = classify(raw(
            418,
            r#"{"error": "SOME_NEW_CODE", "error_description": "?"}"#,
        ))
        .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Other));
    }

    #[test]
    fn structured_shape_takes_precedence_over_legacy_tables() {
        let err = classify(raw(
            400,
            r#"{"error": {"code": "VALIDATION", "message": "bad field",
                "validation": [{"field": "TITLE"}]}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Validation));
        match err {
            Error::Api(api) => assert!(api.validation.is_some()),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_bodies_specialize_by_status() {
        assert!(matches!(
            classify(RawResponse {
                status: StatusCode::FOUND,
                location: Some("https://other.portal.com/".into()),
                body: "<html>moved</html>".into(),
            })
            .unwrap_err(),
            Error::RedirectedResponse { location: Some(_), .. }
        ));
        assert!(matches!(
            classify(raw(403, "denied")).unwrap_err(),
            Error::ForbiddenResponse { .. }
        ));
        assert!(matches!(
            classify(raw(500, "oops")).unwrap_err(),
            Error::ServerErrorResponse { .. }
        ));
        assert!(matches!(
            classify(raw(200, "not json")).unwrap_err(),
            Error::Decode { .. }
        ));
    }

    #[test]
    fn non_success_parseable_body_without_error_field() {
        let err = classify(raw(404, r#"{"detail": "gone"}"#)).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::NotFound));
    }

    #[test]
    fn batch_item_errors_classify_without_status() {
        let api = batch_item_error(&json!({
            "error": "QUERY_LIMIT_EXCEEDED",
            "error_description": "limit",
        }));
        assert_eq!(api.kind, ApiErrorKind::QueryLimitExceeded);
        assert_eq!(api.record.http_status, None);
    }
}
