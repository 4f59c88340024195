//! Detection of objects deleted outside of Terraform

use crate::api::ApiError;

/// Folds a 404 into `Ok(None)`; every other error is returned unchanged.
///
/// Read uses this to drop the resource from state, Delete to treat an
/// already-missing object as deleted.
pub fn check_deleted<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::ApiError { status: 404, .. }) => {
            tracing::debug!("Remote object not found, treating as deleted");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> ApiError {
        ApiError::ApiError {
            status,
            message: "error".to_string(),
            details: None,
        }
    }

    #[test]
    fn success_passes_through() {
        assert_eq!(check_deleted(Ok::<_, ApiError>(7)).unwrap(), Some(7));
    }

    #[test]
    fn not_found_becomes_none() {
        assert_eq!(check_deleted::<()>(Err(api_error(404))).unwrap(), None);
    }

    #[test]
    fn other_errors_are_preserved() {
        let err = check_deleted::<()>(Err(api_error(500))).unwrap_err();
        assert_eq!(err.status(), Some(500));

        let err = check_deleted::<()>(Err(ApiError::Cancelled)).unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
    }
}
