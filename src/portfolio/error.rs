use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataStoreError {
  #[error("Not authenticated - set FOLIO_ACCESS_TOKEN for admin operations")]
  Unauthenticated,

  #[error("Access denied: {0}")]
  AccessDenied(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Server error: {0}")]
  ServerError(String),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  #[error("Invalid upload: {0}")]
  InvalidUpload(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl DataStoreError {
  /// Truncate a response body to avoid logging excessive data
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
      end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
  }

  pub fn from_status(status: u16, body: &str) -> Self {
    let truncated = Self::truncate_body(body);
    match status {
      401 => DataStoreError::Unauthenticated,
      403 => DataStoreError::AccessDenied(truncated),
      404 | 406 => DataStoreError::NotFound(truncated),
      409 => DataStoreError::Conflict(truncated),
      500..=599 => DataStoreError::ServerError(truncated),
      _ => DataStoreError::InvalidResponse(format!("Status {}: {}", status, truncated)),
    }
  }
}
