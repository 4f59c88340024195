//! Data source implementations
//!
//! Data sources only read. A missing object is an error here, unlike in
//! resources where it clears state.

pub mod exchange;
pub mod queue;
pub mod user;
pub mod vhost;

pub use exchange::ExchangeDataSource;
pub use queue::QueueDataSource;
pub use user::UserDataSource;
pub use vhost::VhostDataSource;

use crate::api::ApiError;
use tfplug::types::Diagnostic;

/// A 404 gets its own summary so the missing object is obvious
pub(crate) fn read_error(kind: &str, name: &str, error: &ApiError) -> Diagnostic {
    if error.is_not_found() {
        Diagnostic::error(
            format!("{} not found", kind),
            format!("{} '{}' does not exist", kind, name),
        )
    } else {
        Diagnostic::error(
            format!("Failed to read {}", kind.to_lowercase()),
            format!("API error: {}", error),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_reported_by_name() {
        let error = ApiError::ApiError {
            status: 404,
            message: "Object Not Found".to_string(),
            details: None,
        };
        let diag = read_error("Vhost", "staging", &error);
        assert_eq!(diag.summary, "Vhost not found");
        assert!(diag.detail.contains("staging"));
    }

    #[test]
    fn other_errors_keep_api_message() {
        let diag = read_error("Queue", "jobs", &ApiError::AuthError);
        assert_eq!(diag.summary, "Failed to read queue");
        assert!(diag.detail.starts_with("API error"));
    }
}
