use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use checkout_types::domain::address::Address;
use checkout_types::domain::cart::CartLine;
use checkout_types::domain::money::Money;
use checkout_types::domain::order::{
    Order, OrderItem, OrderPlacement, OrderStatus, PaymentMethod,
};
use checkout_types::domain::payment::{Payment, PaymentOutcome, PaymentStatus};
use checkout_types::ports::commerce_api::{ApiError, CommerceApi};
use dashmap::DashMap;

use crate::errors::SandboxError;

pub const OP_CREATE_ADDRESS: &str = "create_address";
pub const OP_PLACE_ORDER: &str = "place_order";
pub const OP_LIST_ORDERS: &str = "list_orders";
pub const OP_INITIATE_PAYMENT: &str = "initiate_payment";
pub const OP_VERIFY_PAYMENT: &str = "verify_payment";

#[derive(Default)]
struct Counters {
    address: AtomicI64,
    order: AtomicI64,
    payment: AtomicI64,
}

impl Counters {
    fn next(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory order/payment service. Ids start at 1 per kind and payment
/// transaction ids are `T{payment_id}`.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryCommerce {
    carts: Arc<DashMap<i64, Vec<CartLine>>>,
    addresses: Arc<DashMap<i64, (i64, Address)>>,
    orders: Arc<DashMap<i64, Order>>,
    payments: Arc<DashMap<i64, Payment>>,
    ids: Arc<Counters>,
    calls: Arc<DashMap<&'static str, usize>>,
    faults: Arc<DashMap<&'static str, usize>>,
}

impl InMemoryCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the server-side cart of `user_id`.
    pub fn put_cart(&self, user_id: i64, lines: Vec<CartLine>) {
        self.carts.insert(user_id, lines);
    }

    pub fn cart(&self, user_id: i64) -> Vec<CartLine> {
        self.carts
            .get(&user_id)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Makes the next `times` calls of `operation` fail with 503.
    pub fn fail_next(&self, operation: &'static str, times: usize) {
        self.faults.insert(operation, times);
    }

    /// How many times `operation` has been invoked, failed calls included.
    pub fn calls(&self, operation: &'static str) -> usize {
        self.calls.get(operation).map(|c| *c).unwrap_or(0)
    }

    fn enter(&self, operation: &'static str) -> Result<(), SandboxError> {
        *self.calls.entry(operation).or_insert(0) += 1;
        if let Some(mut remaining) = self.faults.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                tracing::debug!(operation, "injected fault");
                return Err(SandboxError::Unavailable(format!("{operation} unavailable")));
            }
        }
        Ok(())
    }

    pub fn add_address(&self, user_id: i64, address: Address) -> Result<Address, SandboxError> {
        self.enter(OP_CREATE_ADDRESS)?;
        address
            .validate()
            .map_err(|e| SandboxError::BadRequest(e.to_string()))?;
        let id = Counters::next(&self.ids.address);
        let saved = Address {
            id: Some(id),
            ..address
        };
        self.addresses.insert(id, (user_id, saved.clone()));
        Ok(saved)
    }

    /// Turns the user's cart into a PENDING order and empties the cart.
    pub fn place(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<Order, SandboxError> {
        self.enter(OP_PLACE_ORDER)?;
        if !self.addresses.contains_key(&address_id) {
            return Err(SandboxError::NotFound("Address not found".into()));
        }
        let lines = self.cart(user_id);
        if lines.iter().all(|l| l.quantity == 0) {
            return Err(SandboxError::BadRequest("Cart is empty".into()));
        }

        let items: Vec<OrderItem> = lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(|l| OrderItem {
                product_id: l.product_id,
                product_name: l.name.clone(),
                quantity: l.quantity,
                price: l.unit_price,
            })
            .collect();
        let total = lines
            .iter()
            .map(CartLine::line_total)
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line?))
            .ok_or_else(|| SandboxError::BadRequest("Cart total out of range".into()))?;

        let order = Order {
            order_id: Counters::next(&self.ids.order),
            user_id: Some(user_id),
            address_id: Some(address_id),
            payment_method: Some(method),
            total_amount: total,
            status: OrderStatus::Pending,
            created_at: Some(Utc::now()),
            items,
        };
        self.orders.insert(order.order_id, order.clone());
        self.carts.remove(&user_id);
        tracing::info!(order_id = order.order_id, user_id, total = %order.total_amount, "sandbox order placed");
        Ok(order)
    }

    pub fn get_order(&self, order_id: i64) -> Result<Order, SandboxError> {
        self.orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or_else(|| SandboxError::NotFound("Order not found".into()))
    }

    pub fn user_orders(&self, user_id: i64) -> Result<Vec<Order>, SandboxError> {
        self.enter(OP_LIST_ORDERS)?;
        let mut list: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .map(|o| o.value().clone())
            .collect();
        list.sort_by_key(|o| o.order_id);
        Ok(list)
    }

    pub fn initiate(&self, order_id: i64, method: PaymentMethod) -> Result<Payment, SandboxError> {
        self.enter(OP_INITIATE_PAYMENT)?;
        let order = self.get_order(order_id)?;
        if !order.is_payable() {
            return Err(SandboxError::Conflict(format!(
                "Order is {} and cannot be paid",
                order.status
            )));
        }
        let payment_id = Counters::next(&self.ids.payment);
        let payment = Payment {
            payment_id,
            order_id,
            method: Some(method),
            amount: order.total_amount,
            transaction_id: format!("T{payment_id}"),
            status: PaymentStatus::Pending,
        };
        self.payments.insert(payment_id, payment.clone());
        Ok(payment)
    }

    /// Applies the gateway verdict to a payment and its order. A payment is
    /// verified at most once, and an order is confirmed at most once.
    pub fn verify(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<Payment, SandboxError> {
        self.enter(OP_VERIFY_PAYMENT)?;
        let mut payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| SandboxError::NotFound("Payment not found".into()))?;
        if payment.transaction_id != transaction_id {
            return Err(SandboxError::BadRequest("Invalid transaction ID".into()));
        }
        if payment.status.is_terminal() {
            return Err(SandboxError::Conflict(format!(
                "Payment already {}",
                payment.status
            )));
        }
        let mut order = self
            .orders
            .get_mut(&payment.order_id)
            .ok_or_else(|| SandboxError::NotFound("Order not found".into()))?;

        let (payment_status, order_status) = if success {
            (PaymentStatus::Success, OrderStatus::Confirmed)
        } else {
            (PaymentStatus::Failed, OrderStatus::PaymentFailed)
        };
        order
            .transition(order_status)
            .map_err(|e| SandboxError::Conflict(e.to_string()))?;
        payment.status = payment_status;
        tracing::info!(payment_id, order_id = order.order_id, status = %payment.status, "sandbox payment verified");
        Ok(payment.clone())
    }

    /// Status of the latest payment for `order_id`.
    pub fn payment_status(&self, order_id: i64) -> Result<Option<PaymentStatus>, SandboxError> {
        self.get_order(order_id)?;
        Ok(self
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.payment_id)
            .map(|p| p.status))
    }
}

#[async_trait]
impl CommerceApi for InMemoryCommerce {
    async fn create_address(&self, user_id: i64, address: &Address) -> Result<i64, ApiError> {
        let saved = self.add_address(user_id, address.clone())?;
        saved
            .id
            .ok_or_else(|| ApiError::Decode("address saved without id".into()))
    }

    async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, ApiError> {
        let order = self.place(user_id, address_id, method)?;
        Ok(OrderPlacement {
            order_id: order.order_id,
            total_amount: order.total_amount,
            status: order.status,
        })
    }

    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, ApiError> {
        Ok(self.user_orders(user_id)?)
    }

    async fn initiate_payment(
        &self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, ApiError> {
        Ok(self.initiate(order_id, method)?)
    }

    async fn verify_payment(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<PaymentOutcome, ApiError> {
        Ok(self.verify(payment_id, transaction_id, success)?.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn springfield() -> Address {
        Address::new("1 Main St", "Springfield", "IL", "62704", "US")
    }

    fn laptop() -> CartLine {
        CartLine::new(1, "Laptop", Money::from_cents(99999).unwrap(), 1)
    }

    fn placed(svc: &InMemoryCommerce) -> Order {
        svc.put_cart(1, vec![laptop()]);
        let addr = svc.add_address(1, springfield()).unwrap();
        svc.place(1, addr.id.unwrap(), PaymentMethod::Card).unwrap()
    }

    #[test]
    fn place_totals_cart_and_empties_it() {
        let svc = InMemoryCommerce::new();
        let order = placed(&svc);
        assert_eq!(order.order_id, 1);
        assert_eq!(order.total_amount.to_string(), "999.99");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(svc.cart(1).is_empty());
    }

    #[test]
    fn place_rejects_unknown_address_and_empty_cart() {
        let svc = InMemoryCommerce::new();
        svc.put_cart(1, vec![laptop()]);
        assert!(matches!(
            svc.place(1, 42, PaymentMethod::Card),
            Err(SandboxError::NotFound(_))
        ));

        let addr = svc.add_address(2, springfield()).unwrap();
        assert!(matches!(
            svc.place(2, addr.id.unwrap(), PaymentMethod::Card),
            Err(SandboxError::BadRequest(_))
        ));
    }

    #[test]
    fn overflowing_cart_total_is_a_bad_request() {
        let svc = InMemoryCommerce::new();
        let price = Money::from_cents(i64::MAX / 2).unwrap();
        svc.put_cart(1, vec![CartLine::new(1, "Yacht", price, 3)]);
        let addr = svc.add_address(1, springfield()).unwrap();
        assert!(matches!(
            svc.place(1, addr.id.unwrap(), PaymentMethod::Card),
            Err(SandboxError::BadRequest(_))
        ));
        // nothing was recorded and the cart is still there
        assert!(svc.get_order(1).is_err());
        assert_eq!(svc.cart(1).len(), 1);
    }

    #[test]
    fn second_verification_is_rejected() {
        let svc = InMemoryCommerce::new();
        let order = placed(&svc);
        let first = svc.initiate(order.order_id, PaymentMethod::Card).unwrap();
        let second = svc.initiate(order.order_id, PaymentMethod::Card).unwrap();
        assert_ne!(first.payment_id, second.payment_id);
        assert_eq!(first.transaction_id, "T1");
        assert_eq!(second.transaction_id, "T2");

        let ok = svc.verify(second.payment_id, "T2", true).unwrap();
        assert_eq!(ok.status, PaymentStatus::Success);
        assert_eq!(svc.get_order(order.order_id).unwrap().status, OrderStatus::Confirmed);

        assert!(matches!(
            svc.verify(first.payment_id, "T1", true),
            Err(SandboxError::Conflict(_))
        ));
        assert!(matches!(
            svc.verify(second.payment_id, "T2", true),
            Err(SandboxError::Conflict(_))
        ));
        // the losing payment stays pending; nothing was applied twice
        assert_eq!(
            svc.payments.get(&first.payment_id).unwrap().status,
            PaymentStatus::Pending
        );
        assert!(matches!(
            svc.initiate(order.order_id, PaymentMethod::Card),
            Err(SandboxError::Conflict(_))
        ));
    }

    #[test]
    fn failed_verification_marks_order_payment_failed() {
        let svc = InMemoryCommerce::new();
        let order = placed(&svc);
        let p = svc.initiate(order.order_id, PaymentMethod::Card).unwrap();
        assert!(matches!(
            svc.verify(p.payment_id, "WRONG", true),
            Err(SandboxError::BadRequest(_))
        ));

        let failed = svc.verify(p.payment_id, &p.transaction_id, false).unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        let order = svc.get_order(order.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::PaymentFailed);
        assert_eq!(
            svc.payment_status(order.order_id).unwrap(),
            Some(PaymentStatus::Failed)
        );

        // still payable with a fresh payment
        let retry = svc.initiate(order.order_id, PaymentMethod::Card).unwrap();
        svc.verify(retry.payment_id, &retry.transaction_id, true).unwrap();
        assert_eq!(
            svc.get_order(order.order_id).unwrap().status,
            OrderStatus::Confirmed
        );
    }

    #[test]
    fn injected_faults_are_consumed_and_counted() {
        let svc = InMemoryCommerce::new();
        svc.fail_next(OP_CREATE_ADDRESS, 1);
        assert!(matches!(
            svc.add_address(1, springfield()),
            Err(SandboxError::Unavailable(_))
        ));
        assert!(svc.add_address(1, springfield()).is_ok());
        assert_eq!(svc.calls(OP_CREATE_ADDRESS), 2);
        assert_eq!(svc.calls(OP_VERIFY_PAYMENT), 0);
    }
}
