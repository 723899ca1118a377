//! User-facing error taxonomy for mutations and backtests

use crate::api::ServiceError;
use thiserror::Error;

/// Raised locally, before any request is sent
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// Non-fatal notification surfaced to the operator. Prior good state is
/// always preserved when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend's state disagrees with the request (duplicate or missing key)
    #[error("{message}")]
    Conflict { message: String },

    /// The backend refused the request for another reason
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Transport, decoding or server-side failure
    #[error("{}", .0.user_message())]
    Transport(ServiceError),

    /// A newer request replaced this one before its response arrived
    #[error("request superseded by a newer one")]
    Superseded,
}

/// Which side of a mutation a 4xx is interpreted against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
    Replace,
    Query,
}

impl DashboardError {
    /// Classify a client failure for the given operation.
    ///
    /// Duplicate adds come back as 400/409, removals of unknown tickers as
    /// 404/409; both mean the watchlist changed under the operator.
    pub fn classify(op: Operation, err: ServiceError) -> Self {
        match (err.status(), op) {
            (Some(400 | 409), Operation::Add) | (Some(404 | 409), Operation::Remove) => {
                DashboardError::Conflict {
                    message: err.user_message(),
                }
            }
            (Some(status), _) if err.is_client_error() => DashboardError::Rejected {
                status,
                message: err.user_message(),
            },
            _ => DashboardError::Transport(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DashboardError::Conflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DashboardError::Validation(_))
    }
}
