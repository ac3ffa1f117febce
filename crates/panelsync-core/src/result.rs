//! Convenience result type alias for PanelSync.

use crate::error::AppError;

/// A specialized `Result` type for PanelSync operations.
pub type AppResult<T> = Result<T, AppError>;
