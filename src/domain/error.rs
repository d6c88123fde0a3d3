//! Domain error taxonomy.
//!
//! `NotFound`, `Forbidden`, `InvalidArgument` and `InvalidState` are expected,
//! user-facing outcomes. Everything else is internal: callers learn only that
//! the operation did not complete, and no partial state was committed.

/// Top-level error type for squadtrader.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("{reason}")]
    InvalidState { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

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

impl MarketError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// True for failures the caller cannot act on (store, config, io).
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::InvalidArgument { .. }
                | Self::InvalidState { .. }
        )
    }
}

impl From<&MarketError> for std::process::ExitCode {
    fn from(err: &MarketError) -> Self {
        let code: u8 = match err {
            MarketError::Io(_) | MarketError::Internal { .. } => 1,
            MarketError::ConfigParse { .. }
            | MarketError::ConfigMissing { .. }
            | MarketError::ConfigInvalid { .. } => 2,
            MarketError::Database { .. } | MarketError::DatabaseQuery { .. } => 3,
            MarketError::NotFound { .. } | MarketError::Forbidden { .. } => 4,
            MarketError::InvalidArgument { .. } | MarketError::InvalidState { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_are_not_internal() {
        assert!(!MarketError::not_found("player").is_internal());
        assert!(!MarketError::forbidden("not your player").is_internal());
        assert!(!MarketError::invalid_argument("bad price").is_internal());
        assert!(!MarketError::invalid_state("not listed").is_internal());
    }

    #[test]
    fn store_errors_are_internal() {
        let err = MarketError::DatabaseQuery {
            reason: "database is locked".into(),
        };
        assert!(err.is_internal());
        assert!(
            MarketError::Internal {
                reason: "task panicked".into()
            }
            .is_internal()
        );
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            MarketError::not_found("buyer team").to_string(),
            "buyer team not found"
        );
        assert_eq!(
            MarketError::invalid_state("insufficient funds").to_string(),
            "insufficient funds"
        );
        let missing = MarketError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        };
        assert_eq!(missing.to_string(), "missing config key [sqlite] path");
    }
}
