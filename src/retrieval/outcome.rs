use log::error;

use crate::error_handling::types::QueryError;

/// Result of a retrieval that never escapes as an error.
///
/// `Complete` with no rows is a successful, empty answer; `Failed` carries
/// the cause so callers can tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    Complete(Vec<T>),
    Failed(QueryError),
}

impl<T> QueryOutcome<T> {
    /// Converts a result, logging the failure with the operation name.
    pub fn from_result(result: Result<Vec<T>, QueryError>, operation: &str) -> Self {
        match result {
            Ok(rows) => QueryOutcome::Complete(rows),
            Err(e) => {
                error!("{} failed: {}", operation, e);
                QueryOutcome::Failed(e)
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            QueryOutcome::Complete(_) => None,
            QueryOutcome::Failed(e) => Some(e),
        }
    }

    /// Rows of a complete outcome; a failure reads as empty.
    pub fn rows(&self) -> &[T] {
        match self {
            QueryOutcome::Complete(rows) => rows,
            QueryOutcome::Failed(_) => &[],
        }
    }

    /// Discards the failure cause, yielding an empty table on error.
    pub fn or_empty(self) -> Vec<T> {
        match self {
            QueryOutcome::Complete(rows) => rows,
            QueryOutcome::Failed(_) => Vec::new(),
        }
    }

    pub fn into_result(self) -> Result<Vec<T>, QueryError> {
        match self {
            QueryOutcome::Complete(rows) => Ok(rows),
            QueryOutcome::Failed(e) => Err(e),
        }
    }
}
