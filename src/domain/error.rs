//! Domain error types.

use std::fmt;

/// Whether retrying a failed gateway call can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GatewayErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayErrorKind::Transient => write!(f, "transient"),
            GatewayErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// A failed request to the broker gateway.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} gateway error: {reason}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub reason: String,
}

impl GatewayError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Transient,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Permanent,
            reason: reason.into(),
        }
    }

    /// Classify a raw gateway message. Anything not recognised as permanent
    /// is treated as transient.
    pub fn classify(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let lower = reason.to_lowercase();
        let permanent = [
            "insufficient buying power",
            "insufficient funds",
            "contract not found",
            "invalid contract",
            "invalid order",
            "invalid quantity",
            "invalid price",
            "not permitted",
        ];
        if permanent.iter().any(|p| lower.contains(p)) {
            Self::permanent(reason)
        } else {
            Self::transient(reason)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == GatewayErrorKind::Transient
    }
}

/// Top-level error type for tmrtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
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
    Gateway(#[from] GatewayError),

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("insufficient history for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Gateway(_) => 3,
            TraderError::Data { .. } | TraderError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
