//! Change notifications for the UI layer.
//!
//! The orchestrator publishes on a `tokio::sync::broadcast` channel; each
//! view subscribes and re-renders on the events it cares about. Publishing
//! with no subscribers is not an error.

use checkout_types::domain::money::Money;
use checkout_types::domain::order::PaymentMethod;
use tokio::sync::broadcast;

/// Channel capacity for checkout events.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    AddressFallback {
        address_id: i64,
        reason: String,
    },
    OrderPlaced {
        order_id: i64,
        total_amount: Money,
        method: PaymentMethod,
    },
    CartCleared,
    PaymentInitiated {
        order_id: i64,
        payment_id: i64,
        transaction_id: String,
    },
    PaymentProcessing {
        order_id: i64,
        payment_id: i64,
    },
    OrderConfirmed {
        order_id: i64,
        payment_id: i64,
        transaction_id: String,
    },
    PaymentFailed {
        order_id: i64,
        reason: String,
        retryable: bool,
    },
    PaymentRetryReady {
        order_id: i64,
    },
    PaymentClosed,
    OrdersLoaded {
        count: usize,
    },
    Error {
        message: String,
    },
}

impl CheckoutEvent {
    pub fn user_message(&self) -> String {
        match self {
            CheckoutEvent::AddressFallback { address_id, .. } => {
                format!("Could not save address, using saved address #{address_id}")
            }
            CheckoutEvent::OrderPlaced {
                order_id,
                total_amount,
                method,
            } => format!("Order #{order_id} placed: ${total_amount} via {method}"),
            CheckoutEvent::CartCleared => "Cart cleared".into(),
            CheckoutEvent::PaymentInitiated { payment_id, .. } => {
                format!("Payment initiated! ID: {payment_id}")
            }
            CheckoutEvent::PaymentProcessing { .. } => "Processing payment...".into(),
            CheckoutEvent::OrderConfirmed {
                order_id,
                transaction_id,
                ..
            } => format!(
                "Payment Successful! Transaction ID: {transaction_id}. Order #{order_id} CONFIRMED"
            ),
            CheckoutEvent::PaymentFailed { .. } => "Payment Failed. Please try again.".into(),
            CheckoutEvent::PaymentRetryReady { .. } => "Re-enter your card details".into(),
            CheckoutEvent::PaymentClosed => "Payment closed".into(),
            CheckoutEvent::OrdersLoaded { count } => format!("Loaded {count} orders"),
            CheckoutEvent::Error { message } => message.clone(),
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CheckoutEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: CheckoutEvent) {
        tracing::debug!(?event, "checkout event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
