use async_trait::async_trait;

use crate::domain::payment::{CardDetails, PaymentHandle};

/// Result of asking the payment gateway whether funds were collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayVerdict {
    pub success: bool,
    pub reason: Option<String>,
}

impl GatewayVerdict {
    pub fn approved() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("payment gateway: {0}")]
pub struct GatewayError(pub String);

/// Source of the asynchronous confirmation that precedes verification.
///
/// A real integration waits on the provider's callback; the verdict is
/// then forwarded to the order service's verify endpoint.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn confirm(
        &self,
        handle: &PaymentHandle,
        card: &CardDetails,
    ) -> Result<GatewayVerdict, GatewayError>;
}
