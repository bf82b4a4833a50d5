//! Convenience result type alias for SchemaSync.

use crate::error::AppError;

/// A specialized `Result` type for SchemaSync operations.
pub type AppResult<T> = Result<T, AppError>;
