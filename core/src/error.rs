use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Illegal state: cannot {operation} while {state}")]
    IllegalState { operation: &'static str, state: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnalyticsError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field, reason: reason.into() }
    }

    pub fn illegal_state(operation: &'static str, state: impl Into<String>) -> Self {
        Self::IllegalState { operation, state: state.into() }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Response status the calling layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::NotFound { .. }     => 404,
            Self::IllegalState { .. } => 409,
            _                         => 500,
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Reject NaN/inf and values outside `[min, max]`.
pub(crate) fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> AnalyticsResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(AnalyticsError::invalid(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ));
    }
    Ok(())
}
