//! Error taxonomy for remote reads and writes.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// A single field-level validation failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  /// Dotted location of the offending field (e.g. `body.effective_date`)
  pub field: String,
  pub message: String,
}

/// Errors surfaced by the remote data source.
///
/// Errors are `Clone` so a single failed fetch can be handed to every
/// subscriber waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
  /// No response at all (connection refused, DNS, timeout)
  #[error("network error: {0}")]
  Network(String),

  /// 4xx other than 401, with the server's detail message
  #[error("{detail}")]
  Validation {
    status: u16,
    detail: String,
    fields: Vec<FieldError>,
  },

  /// 401: the session is gone and must be re-established
  #[error("not authenticated, please log in again")]
  Auth,

  /// 5xx
  #[error("server error ({status}): {detail}")]
  Server { status: u16, detail: String },

  /// Response body did not match the expected shape
  #[error("failed to decode response: {0}")]
  Decode(String),

  /// The task driving a fetch went away before producing a result
  #[error("request was cancelled")]
  Cancelled,
}

impl ApiError {
  /// Whether the query engine may retry after this error.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ApiError::Network(_) | ApiError::Server { .. })
  }

  pub fn is_auth(&self) -> bool {
    matches!(self, ApiError::Auth)
  }

  /// HTTP status, when the error came from a response.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Validation { status, .. } | ApiError::Server { status, .. } => Some(*status),
      ApiError::Auth => Some(401),
      _ => None,
    }
  }

  /// Field errors for inline form display. Empty for non-validation errors.
  pub fn field_errors(&self) -> &[FieldError] {
    match self {
      ApiError::Validation { fields, .. } => fields,
      _ => &[],
    }
  }

  /// Build an error from a non-success status and its raw body.
  pub fn from_response(status: u16, body: &str) -> Self {
    if status == 401 {
      return ApiError::Auth;
    }

    let (detail, fields) = parse_detail(body);
    let detail = detail.unwrap_or_else(|| default_detail(status).to_string());

    if status >= 500 {
      ApiError::Server { status, detail }
    } else {
      ApiError::Validation {
        status,
        detail,
        fields,
      }
    }
  }

  pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
    ApiError::Decode(err.to_string())
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
      ApiError::from_response(status.as_u16(), "")
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  detail: Value,
}

#[derive(Debug, Deserialize)]
struct ValidationItem {
  #[serde(default)]
  loc: Vec<Value>,
  msg: String,
}

/// Extract `{detail}` from an error body.
///
/// `detail` is either a plain string or a list of `{loc, msg}` items
/// (request validation failures).
fn parse_detail(body: &str) -> (Option<String>, Vec<FieldError>) {
  let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
    return (None, Vec::new());
  };

  match parsed.detail {
    Value::String(detail) => (Some(detail), Vec::new()),
    Value::Array(items) => {
      let fields: Vec<FieldError> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ValidationItem>(item).ok())
        .map(|item| FieldError {
          field: item
            .loc
            .iter()
            .map(|segment| match segment {
              Value::String(s) => s.clone(),
              other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("."),
          message: item.msg,
        })
        .collect();

      let detail = fields
        .first()
        .map(|f| format!("{}: {}", f.field, f.message));
      (detail, fields)
    }
    _ => (None, Vec::new()),
  }
}

fn default_detail(status: u16) -> &'static str {
  match status {
    400 => "Bad request",
    403 => "Forbidden",
    404 => "Not found",
    409 => "Conflict",
    422 => "Validation failed",
    s if s >= 500 => "Internal server error",
    _ => "Request failed",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_string_detail() {
    let err = ApiError::from_response(404, r#"{"detail": "Account not found"}"#);
    assert_eq!(
      err,
      ApiError::Validation {
        status: 404,
        detail: "Account not found".to_string(),
        fields: Vec::new(),
      }
    );
    assert!(!err.is_retryable());
  }

  #[test]
  fn test_validation_list_detail() {
    let body = r#"{"detail": [
      {"loc": ["body", "effective_date"], "msg": "field required", "type": "missing"},
      {"loc": ["body", "premium"], "msg": "not a decimal", "type": "decimal_parsing"}
    ]}"#;
    let err = ApiError::from_response(422, body);

    let fields = err.field_errors();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].field, "body.effective_date");
    assert_eq!(fields[1].message, "not a decimal");
    assert_eq!(err.to_string(), "body.effective_date: field required");
  }

  #[test]
  fn test_server_error_is_retryable() {
    let err = ApiError::from_response(503, "upstream unavailable");
    assert!(matches!(err, ApiError::Server { status: 503, .. }));
    assert!(err.is_retryable());
    assert!(ApiError::Network("refused".into()).is_retryable());
  }

  #[test]
  fn test_unauthorized_maps_to_auth() {
    let err = ApiError::from_response(401, r#"{"detail": "Could not validate credentials"}"#);
    assert!(err.is_auth());
    assert_eq!(err.status(), Some(401));
  }

  #[test]
  fn test_missing_body_uses_default_detail() {
    let err = ApiError::from_response(409, "");
    assert_eq!(err.to_string(), "Conflict");
  }
}
