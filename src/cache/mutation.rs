//! Mutation descriptors and user-facing notices.

use tracing::{error, info};

use super::key::QueryKey;
use crate::error::ApiError;

/// A named write operation and the key prefixes it invalidates on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
  pub name: &'static str,
  /// Invalidated in order, after the write is acknowledged
  pub invalidates: Vec<QueryKey>,
  /// Shown to the user when the write succeeds
  pub success_message: Option<&'static str>,
}

impl MutationDescriptor {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      invalidates: Vec::new(),
      success_message: None,
    }
  }

  pub fn invalidates(mut self, prefix: QueryKey) -> Self {
    self.invalidates.push(prefix);
    self
  }

  pub fn on_success(mut self, message: &'static str) -> Self {
    self.success_message = Some(message);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Success,
  Error,
}

/// A user-visible notification (what a web front end shows as a toast).
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
  pub error: Option<ApiError>,
}

impl Notice {
  pub fn success(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Success,
      message: message.into(),
      error: None,
    }
  }

  /// Notice for a failed write, worded from the error class.
  pub fn failure(operation: &str, error: &ApiError) -> Self {
    let message = match error {
      ApiError::Validation { detail, .. } => detail.clone(),
      ApiError::Auth => "Your session has expired. Please log in again.".to_string(),
      ApiError::Network(_) => format!("{} failed: could not reach the server", operation),
      _ => format!("{} failed", operation),
    };
    Self {
      level: NoticeLevel::Error,
      message,
      error: Some(error.clone()),
    }
  }
}

/// Receives notices for the user.
pub trait Notifier: Send + Sync {
  fn notify(&self, notice: Notice);
}

/// Notifier that only logs. The default when no front end is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, notice: Notice) {
    match notice.level {
      NoticeLevel::Success => info!(message = %notice.message, "notice"),
      NoticeLevel::Error => error!(message = %notice.message, "notice"),
    }
  }
}
