use std::time::Duration;

use checkout_types::ports::commerce_api::ApiError;
use thiserror::Error;

/// Everything that can stop a checkout step. None of these are fatal: the
/// user can always retry with a fresh action.
#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("{operation} failed: {source}")]
    RemoteCall {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("no pending payment: initiate a payment before confirming")]
    NoPendingPayment,

    #[error("payment {transaction_id} was declined: {reason}")]
    Declined {
        transaction_id: String,
        reason: String,
    },

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl CheckoutError {
    pub fn validation(err: impl ToString) -> Self {
        CheckoutError::Validation(err.to_string())
    }

    /// Text suitable for a toast or status line.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(m) => m.clone(),
            CheckoutError::RemoteCall { operation, source } => match source {
                ApiError::Status { body, .. } if !body.trim().is_empty() => {
                    format!("{operation} failed: {}", body.trim())
                }
                _ => format!("{operation} failed. Please try again."),
            },
            CheckoutError::NoPendingPayment => "Payment not initialized".into(),
            CheckoutError::Declined { .. } | CheckoutError::Gateway(_) => {
                "Payment Failed. Please try again.".into()
            }
            CheckoutError::Timeout { operation, .. } => {
                format!("{operation} is taking too long. Please try again.")
            }
            CheckoutError::Cancelled => "Cancelled".into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, CheckoutError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_body_reaches_the_user() {
        let err = CheckoutError::RemoteCall {
            operation: "place order",
            source: ApiError::status(400, "Cart is empty"),
        };
        assert_eq!(err.user_message(), "place order failed: Cart is empty");

        let transport = CheckoutError::RemoteCall {
            operation: "place order",
            source: ApiError::Transport("connection refused".into()),
        };
        assert_eq!(
            transport.user_message(),
            "place order failed. Please try again."
        );
    }

    #[test]
    fn only_validation_is_not_retryable() {
        assert!(!CheckoutError::validation("bad").is_retryable());
        assert!(CheckoutError::NoPendingPayment.is_retryable());
        assert!(CheckoutError::Cancelled.is_retryable());
    }
}
