use async_trait::async_trait;

use crate::domain::address::Address;
use crate::domain::order::{Order, OrderPlacement, PaymentMethod};
use crate::domain::payment::{Payment, PaymentOutcome};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("service responded {code}: {body}")]
    Status { code: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(code: u16, body: impl Into<String>) -> Self {
        ApiError::Status {
            code,
            body: body.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// The remote order/payment operations consumed during checkout.
#[async_trait]
pub trait CommerceApi: Send + Sync + 'static {
    async fn create_address(&self, user_id: i64, address: &Address) -> Result<i64, ApiError>;

    async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, ApiError>;

    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, ApiError>;

    async fn initiate_payment(
        &self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, ApiError>;

    async fn verify_payment(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<PaymentOutcome, ApiError>;
}

#[async_trait]
impl<T: CommerceApi + ?Sized> CommerceApi for std::sync::Arc<T> {
    async fn create_address(&self, user_id: i64, address: &Address) -> Result<i64, ApiError> {
        (**self).create_address(user_id, address).await
    }

    async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, ApiError> {
        (**self).place_order(user_id, address_id, method).await
    }

    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, ApiError> {
        (**self).list_orders(user_id).await
    }

    async fn initiate_payment(
        &self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, ApiError> {
        (**self).initiate_payment(order_id, method).await
    }

    async fn verify_payment(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<PaymentOutcome, ApiError> {
        (**self)
            .verify_payment(payment_id, transaction_id, success)
            .await
    }
}
