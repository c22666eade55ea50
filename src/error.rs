//! Error types for platform API calls.
//!
//! Failures fall into three layers: transport errors ([`Error::Connection`],
//! [`Error::Timeout`]), decode errors for bodies that are not valid JSON
//! (specialized by the originating HTTP status), and [`ApiError`] for bodies
//! the platform itself marked as failed. Every variant preserves the raw
//! response where one exists, so callers can log exactly what the server sent.

use http::StatusCode;
use serde_json::Value;

/// The main error type for platform API calls.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level failure (DNS, connect, TLS, broken transfer).
    #[error("connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// The request exceeded the configured timeout.
    ///
    /// Timeouts abort the current attempt outright; only the
    /// temporarily-unavailable status is retried by the transport.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// A redirect response whose body could not be decoded.
    ///
    /// When `location` points at a different host than the configured domain,
    /// the credential guard treats this as a portal move and retries once
    /// against the new domain. A same-host redirect is terminal.
    #[error("redirect response ({status}) with undecodable body")]
    RedirectedResponse {
        /// The 3xx status the server answered with.
        status: StatusCode,
        /// The `Location` header, if the server sent one.
        location: Option<String>,
        /// The raw response body.
        raw_body: String,
    },

    /// A 403 response whose body could not be decoded.
    #[error("forbidden response with undecodable body")]
    ForbiddenResponse {
        /// The raw response body.
        raw_body: String,
    },

    /// A 5xx response whose body could not be decoded.
    #[error("server error {status} with undecodable body")]
    ServerErrorResponse {
        /// The 5xx status the server answered with.
        status: StatusCode,
        /// The raw response body.
        raw_body: String,
    },

    /// The response body could not be decoded as the expected shape.
    #[error("failed to decode response body (status {status}): {reason}")]
    Decode {
        /// The HTTP status of the response.
        status: StatusCode,
        /// The raw response body.
        raw_body: String,
        /// The underlying parse error message.
        reason: String,
    },

    /// The platform reported a failure. See [`ApiError`].
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A batch submission exceeded the configured command limit.
    ///
    /// Raised before any network call is issued.
    #[error("batch of {size} commands exceeds the maximum of {max}")]
    BatchTooLong {
        /// Number of commands submitted.
        size: usize,
        /// The configured maximum.
        max: usize,
    },

    /// Two batch commands used the same label.
    ///
    /// Colliding labels would silently overwrite each other when chunked
    /// results are merged, so they are rejected before any network call.
    #[error("duplicate batch label {0:?}")]
    DuplicateBatchLabel(String),

    /// The client or request was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided or received.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RedirectedResponse { status, .. }
            | Error::ServerErrorResponse { status, .. }
            | Error::Decode { status, .. } => Some(*status),
            Error::ForbiddenResponse { .. } => Some(StatusCode::FORBIDDEN),
            Error::Api(api) => api.record.http_status,
            _ => None,
        }
    }

    /// Returns the raw response body if this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::RedirectedResponse { raw_body, .. }
            | Error::ForbiddenResponse { raw_body }
            | Error::ServerErrorResponse { raw_body, .. }
            | Error::Decode { raw_body, .. } => Some(raw_body),
            Error::Api(api) => Some(&api.raw_body),
            _ => None,
        }
    }

    /// Returns the platform error kind for [`Error::Api`] variants.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api(api) => Some(api.kind),
            _ => None,
        }
    }
}

/// A failure reported by the platform itself.
///
/// Carries the classified [`ApiErrorKind`], the parsed code/description as an
/// [`ErrorRecord`], the `validation` payload of the structured error shape
/// when present, and the raw body.
#[derive(thiserror::Error, Debug)]
#[error("API error {}: {}", record.code, record.description)]
pub struct ApiError {
    /// The classified error kind.
    pub kind: ApiErrorKind,
    /// Status, platform code, and human-readable description.
    pub record: ErrorRecord,
    /// Per-field validation details from the structured error shape.
    pub validation: Option<Value>,
    /// The raw response body (or per-item payload for batch sub-errors).
    pub raw_body: String,
}

/// The parsed classification of a platform failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The HTTP status of the response, absent for batch per-item errors.
    pub http_status: Option<StatusCode>,
    /// The platform error code, upper-cased for the legacy flat shape.
    pub code: String,
    /// The platform's description of the failure.
    pub description: String,
}

/// Platform error kinds.
///
/// Resolution order for the legacy flat error shape: the upper-cased code is
/// looked up via [`ApiErrorKind::from_code`], then the HTTP status via
/// [`ApiErrorKind::from_status`], then [`ApiErrorKind::Other`]. The structured
/// `{error: {code, message}}` shape resolves independently through
/// [`ApiErrorKind::from_structured`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiErrorKind {
    /// The access token has expired; recoverable via refresh.
    ExpiredToken,
    /// The token is malformed or revoked; not recoverable.
    InvalidToken,
    /// The application lacks the scope required by the method.
    InsufficientScope,
    /// The per-portal request quota was exhausted.
    QueryLimitExceeded,
    /// The portal is shedding load.
    OverloadLimit,
    /// The server rejected a batch as too long.
    BatchLengthExceeded,
    /// The requested method does not exist.
    MethodNotFound,
    /// The authenticated user may not perform the operation.
    AccessDenied,
    /// No authentication material was found in the request.
    NoAuthFound,
    /// The request was malformed.
    InvalidRequest,
    /// Generic authorization failure.
    AuthorizationError,
    /// The user account is disabled or lacks portal access.
    UserAccessError,
    /// Structured-shape validation failure (carries a `validation` payload).
    Validation,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    TooManyRequests,
    InternalServerError,
    ServiceUnavailable,
    /// Anything the tables do not know about.
    Other,
}

impl ApiErrorKind {
    /// Looks up a legacy (flat-shape) error code. Codes are compared
    /// upper-cased, as the platform is inconsistent about casing.
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "EXPIRED_TOKEN" => Self::ExpiredToken,
            "INVALID_TOKEN" | "INVALID_GRANT" => Self::InvalidToken,
            "INSUFFICIENT_SCOPE" => Self::InsufficientScope,
            "QUERY_LIMIT_EXCEEDED" => Self::QueryLimitExceeded,
            "OVERLOAD_LIMIT" => Self::OverloadLimit,
            "ERROR_BATCH_LENGTH_EXCEEDED" => Self::BatchLengthExceeded,
            "ERROR_METHOD_NOT_FOUND" | "METHOD_NOT_FOUND" => Self::MethodNotFound,
            "ACCESS_DENIED" => Self::AccessDenied,
            "NO_AUTH_FOUND" => Self::NoAuthFound,
            "INVALID_REQUEST" => Self::InvalidRequest,
            "AUTHORIZATION_ERROR" => Self::AuthorizationError,
            "USER_ACCESS_ERROR" => Self::UserAccessError,
            _ => return None,
        })
    }

    /// Looks up an HTTP status in the status fallback table.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        Some(match status.as_u16() {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            429 => Self::TooManyRequests,
            500 => Self::InternalServerError,
            503 => Self::ServiceUnavailable,
            _ => return None,
        })
    }

    /// Resolves the structured `{error: {code, message}}` shape.
    ///
    /// An independent taxonomy from the legacy tables: selected whenever the
    /// payload matches the structured shape, regardless of status overlap.
    pub fn from_structured(status: StatusCode, code: &str) -> Self {
        match (status.as_u16(), code) {
            (_, "EXPIRED_TOKEN") | (_, "AUTH_EXPIRED") => Self::ExpiredToken,
            (401, "INVALID_CREDENTIALS") => Self::InvalidToken,
            (401, _) => Self::Unauthorized,
            (400, "VALIDATION") | (400, "INVALID_ARGUMENT") => Self::Validation,
            (400, _) => Self::BadRequest,
            _ => Self::Other,
        }
    }
}

/// A specialized `Result` type for platform API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_code_table() {
        assert_eq!(
            ApiErrorKind::from_code("EXPIRED_TOKEN"),
            Some(ApiErrorKind::ExpiredToken)
        );
        assert_eq!(
            ApiErrorKind::from_code("QUERY_LIMIT_EXCEEDED"),
            Some(ApiErrorKind::QueryLimitExceeded)
        );
        assert_eq!(
            ApiErrorKind::from_code("ERROR_BATCH_LENGTH_EXCEEDED"),
            Some(ApiErrorKind::BatchLengthExceeded)
        );
        assert_eq!(ApiErrorKind::from_code("SOMETHING_ELSE"), None);
    }

    #[test]
    fn status_fallback_table() {
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::UNAUTHORIZED),
            Some(ApiErrorKind::Unauthorized)
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(ApiErrorKind::ServiceUnavailable)
        );
        assert_eq!(ApiErrorKind::from_status(StatusCode::IM_A_TEAPOT), None);
    }

    #[test]
    fn structured_table_is_independent_of_legacy() {
        assert_eq!(
            ApiErrorKind::from_structured(StatusCode::UNAUTHORIZED, "EXPIRED_TOKEN"),
            ApiErrorKind::ExpiredToken
        );
        assert_eq!(
            ApiErrorKind::from_structured(StatusCode::BAD_REQUEST, "VALIDATION"),
            ApiErrorKind::Validation
        );
        assert_eq!(
            ApiErrorKind::from_structured(StatusCode::BAD_REQUEST, "UNKNOWN"),
            ApiErrorKind::BadRequest
        );
        assert_eq!(
            ApiErrorKind::from_structured(StatusCode::OK, "UNKNOWN"),
            ApiErrorKind::Other
        );
    }

    #[test]
    fn error_accessors() {
        let err = Error::Api(ApiError {
            kind: ApiErrorKind::ExpiredToken,
            record: ErrorRecord {
                http_status: Some(StatusCode::UNAUTHORIZED),
                code: "EXPIRED_TOKEN".into(),
                description: "The access token provided has expired".into(),
            },
            validation: None,
            raw_body: "{}".into(),
        });
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.api_kind(), Some(ApiErrorKind::ExpiredToken));
        assert_eq!(err.raw_response(), Some("{}"));
    }
}
