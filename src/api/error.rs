//! Normalized failures of the trading backend client

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Every client operation fails with exactly one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// No response was received (connect failure, reset, unreadable body)
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("{message} (status {status})")]
    Service { status: u16, message: String },

    /// The body did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The request could not be built, so nothing was sent
    #[error("invalid request: {0}")]
    Request(String),
}

impl ServiceError {
    /// Build a `Service` error from a non-2xx response body.
    ///
    /// The backend reports failures as `{"detail": "..."}`; request validation
    /// failures carry `detail` as a list of `{"msg": ...}` items instead.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_detail(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
        });

        ServiceError::Service {
            status: status.as_u16(),
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 4xx responses, i.e. the backend understood and refused the request
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ServiceError::Decode(_))
    }

    /// Message suitable for showing to the operator as-is
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Service { message, .. } => message.clone(),
            ServiceError::Network(_) => "Trading backend is unreachable".to_string(),
            ServiceError::Decode(_) => "Trading backend sent an unexpected response".to_string(),
            ServiceError::Request(reason) => format!("Request could not be sent: {}", reason),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ServiceError::Request(err.to_string())
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Decode(err.to_string())
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_used_verbatim() {
        let err = ServiceError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Ticker already in watchlist"}"#,
        );

        assert_eq!(
            err,
            ServiceError::Service {
                status: 400,
                message: "Ticker already in watchlist".to_string()
            }
        );
        assert_eq!(err.user_message(), "Ticker already in watchlist");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_validation_detail_list() {
        let body = r#"{"detail": [
            {"loc": ["body", "take_profit_pct"], "msg": "field required", "type": "missing"},
            {"loc": ["body", "is_trading_enabled"], "msg": "value is not a valid boolean"}
        ]}"#;

        let err = ServiceError::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(
            err.user_message(),
            "field required; value is not a valid boolean"
        );
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn test_missing_detail_falls_back_to_reason() {
        let err =
            ServiceError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.user_message(), "Internal Server Error");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_network_and_decode_messages() {
        let net = ServiceError::Network("connection refused".into());
        assert_eq!(net.status(), None);
        assert!(net.to_string().contains("connection refused"));

        let decode: ServiceError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(decode.is_decode());
    }

    #[test]
    fn test_request_error_is_local() {
        let err = ServiceError::Request("invalid base URL mailto:ops".into());
        assert_eq!(err.status(), None);
        assert!(!err.is_client_error());
        assert!(!err.is_decode());
        assert_eq!(
            err.user_message(),
            "Request could not be sent: invalid base URL mailto:ops"
        );
    }
}
