//! Domain error types.

/// Top-level error type for polydash.
#[derive(Debug, thiserror::Error)]
pub enum PolydashError {
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("size {size} exceeds maximum position size {max}")]
    LimitExceeded { size: f64, max: f64 },

    #[error("position {id} is already closed")]
    PositionClosed { id: i64 },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("{source_name} unavailable: {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PolydashError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn market_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "market",
            id: id.into(),
        }
    }

    pub fn upstream(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors raised before any store mutation was attempted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::LimitExceeded { .. }
                | Self::PositionClosed { .. }
                | Self::OrderRejected { .. }
        )
    }
}

impl From<&PolydashError> for std::process::ExitCode {
    fn from(err: &PolydashError) -> Self {
        let code: u8 = match err {
            PolydashError::Io(_) => 1,
            PolydashError::ConfigParse { .. }
            | PolydashError::ConfigMissing { .. }
            | PolydashError::ConfigInvalid { .. } => 2,
            PolydashError::Store { .. } => 3,
            PolydashError::Validation { .. }
            | PolydashError::NotFound { .. }
            | PolydashError::LimitExceeded { .. }
            | PolydashError::PositionClosed { .. }
            | PolydashError::OrderRejected { .. } => 4,
            PolydashError::UpstreamUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
