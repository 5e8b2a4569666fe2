use std::time::Duration;

use async_trait::async_trait;
use checkout_types::domain::payment::{CardDetails, PaymentHandle};
use checkout_types::ports::payment_gateway::{GatewayError, GatewayVerdict, PaymentGateway};

/// Stand-in gateway: waits a fixed settle delay and approves every payment.
///
/// Swap for an adapter that awaits the provider's callback before going to
/// production.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    settle_delay: Duration,
}

impl SimulatedGateway {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn confirm(
        &self,
        handle: &PaymentHandle,
        card: &CardDetails,
    ) -> Result<GatewayVerdict, GatewayError> {
        tracing::debug!(
            payment_id = handle.payment_id,
            card = %card.last4(),
            settle_ms = self.settle_delay.as_millis() as u64,
            "simulating gateway settle"
        );
        tokio::time::sleep(self.settle_delay).await;
        Ok(GatewayVerdict::approved())
    }
}
