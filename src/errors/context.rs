//! Context helpers for turning foreign errors into `AppError`

use super::types::AppError;
use std::path::PathBuf;

/// Extension trait for attaching file context to errors
pub trait ErrorContextExt<T> {
    /// Add operation and file context, producing an `AppError::Io`
    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, AppError>;
}

impl<T, E> ErrorContextExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, AppError> {
        self.map_err(|e| AppError::io_with_source(path, operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_file_operation() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result
            .in_file_operation("/tmp/requests", "read requests")
            .unwrap_err();

        match err {
            AppError::Io { path, operation, .. } => {
                assert_eq!(path, PathBuf::from("/tmp/requests"));
                assert_eq!(operation, "read requests");
            }
            other => panic!("Expected Io error, got {other:?}"),
        }
    }
}
