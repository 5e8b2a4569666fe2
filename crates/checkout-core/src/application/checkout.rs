use checkout_types::domain::address::Address;
use checkout_types::domain::cart::Cart;
use checkout_types::domain::order::{Order, OrderPlacement, OrderStatus, PaymentMethod};
use checkout_types::domain::payment::{CardDetails, PaymentHandle, PaymentOutcome, PaymentStatus};
use checkout_types::ports::commerce_api::{ApiError, CommerceApi};
use checkout_types::ports::payment_gateway::PaymentGateway;
use checkout_types::ports::session_store::SessionStore;
use tokio::sync::broadcast;

use super::cancel::{CallGuard, CancelHandle};
use crate::config::{AddressFallback, CheckoutConfig};
use crate::errors::CheckoutError;
use crate::events::{CheckoutEvent, EventPublisher};
use crate::session::{AuthSession, CheckoutSession, PaymentPhase, User};

/// Drives one user's checkout: address, order, payment initiation and
/// verification, strictly one step at a time.
///
/// Every method takes `&mut self`, so two steps of the same session can
/// never overlap.
pub struct Checkout<A: CommerceApi, G: PaymentGateway> {
    api: A,
    gateway: G,
    config: CheckoutConfig,
    session: CheckoutSession,
    events: EventPublisher,
    guard: CallGuard,
}

impl<A: CommerceApi, G: PaymentGateway> Checkout<A, G> {
    pub fn new(api: A, gateway: G, config: CheckoutConfig) -> Self {
        let guard = CallGuard::new(config.call_timeout);
        Self {
            api,
            gateway,
            config,
            session: CheckoutSession::default(),
            events: EventPublisher::new(),
            guard,
        }
    }

    pub fn with_session(mut self, session: CheckoutSession) -> Self {
        self.session = session;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.events.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.guard.handle()
    }

    pub fn session(&self) -> &CheckoutSession {
        &self.session
    }

    pub fn cart(&self) -> &Cart {
        &self.session.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.session.cart
    }

    pub fn phase(&self) -> &PaymentPhase {
        &self.session.phase
    }

    /// Attaches `user` to the session. Without a non-blank bearer `token`
    /// the user can browse but not check out.
    pub fn sign_in(&mut self, user: User, token: &str) {
        if self.session.cart.user_id != user.id {
            self.session.cart = Cart::new(user.id);
        }
        self.session.authenticated = !token.trim().is_empty();
        self.session.user = Some(user);
    }

    /// Signs in from a restored [`AuthSession`].
    pub fn resume<S: SessionStore>(&mut self, auth: &AuthSession<S>) -> Result<(), CheckoutError> {
        match (auth.user(), auth.token()) {
            (Some(user), Some(token)) => {
                self.sign_in(user.clone(), token);
                Ok(())
            }
            _ => Err(CheckoutError::validation("Please login to checkout")),
        }
    }

    pub fn sign_out(&mut self) {
        self.session = CheckoutSession::default();
    }

    fn require_user(&self) -> Result<i64, CheckoutError> {
        match &self.session.user {
            Some(user) if self.session.authenticated => Ok(user.id),
            _ => Err(CheckoutError::validation("Please login to checkout")),
        }
    }

    fn report(&self, err: &CheckoutError) {
        self.events.publish(CheckoutEvent::Error {
            message: err.user_message(),
        });
    }

    /// Creates the shipping address and places an order for the session
    /// cart. On success the local cart is cleared and the session waits for
    /// a payment to be initiated.
    pub async fn place_order(
        &mut self,
        address: &Address,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, CheckoutError> {
        let user_id = self.require_user()?;
        if self.session.cart.is_empty() {
            return Err(CheckoutError::validation("Your cart is empty"));
        }
        address.validate().map_err(CheckoutError::validation)?;
        self.guard.rearm();

        tracing::info!(user_id, items = self.session.cart.item_count(), "placing order");

        let address_id = match self
            .guard
            .run("create address", self.api.create_address(user_id, address))
            .await
        {
            Ok(id) => {
                tracing::debug!(address_id = id, "address created");
                id
            }
            Err(CheckoutError::Cancelled) => return Err(CheckoutError::Cancelled),
            Err(err) => match self.config.address_fallback {
                AddressFallback::UseDefault(fallback) => {
                    tracing::warn!(
                        error = %err,
                        address_id = fallback,
                        "address creation failed, using fallback address"
                    );
                    self.events.publish(CheckoutEvent::AddressFallback {
                        address_id: fallback,
                        reason: err.to_string(),
                    });
                    fallback
                }
                AddressFallback::Abort => {
                    self.report(&err);
                    return Err(err);
                }
            },
        };

        let placement = match self
            .guard
            .run(
                "place order",
                self.api.place_order(user_id, address_id, method.clone()),
            )
            .await
        {
            Ok(p) if p.status == OrderStatus::Pending && !p.total_amount.is_zero() => p,
            Ok(p) => {
                let err = CheckoutError::RemoteCall {
                    operation: "place order",
                    source: ApiError::Decode(format!(
                        "order {} was created as {} with total {}, expected a PENDING order with a positive total",
                        p.order_id, p.status, p.total_amount
                    )),
                };
                self.report(&err);
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(error = %err, "order placement failed, cart kept");
                self.report(&err);
                return Err(err);
            }
        };

        tracing::info!(
            order_id = placement.order_id,
            total = %placement.total_amount,
            "order placed"
        );

        self.session.cart.clear();
        self.events.publish(CheckoutEvent::CartCleared);

        self.session
            .order_status
            .insert(placement.order_id, placement.status);
        self.session.pending_order_id = Some(placement.order_id);
        self.session.active_payment = None;
        self.session.phase = PaymentPhase::AwaitingInitiation;
        self.events.publish(CheckoutEvent::OrderPlaced {
            order_id: placement.order_id,
            total_amount: placement.total_amount,
            method,
        });

        Ok(placement)
    }

    /// Creates a PENDING payment for `order_id`. The returned handle becomes
    /// the session's active payment, replacing any earlier one.
    pub async fn initiate_payment(
        &mut self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<PaymentHandle, CheckoutError> {
        if let Some(status) = self.session.known_status(order_id) {
            if !status.is_payable() {
                return Err(CheckoutError::validation(format!(
                    "Order #{order_id} is {status} and cannot be paid"
                )));
            }
        }
        self.guard.rearm();

        let payment = match self
            .guard
            .run("initiate payment", self.api.initiate_payment(order_id, method))
            .await
        {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(order_id, error = %err, "payment initiation failed");
                // A handle for another order must not be confirmed in place of this one.
                if self
                    .session
                    .active_payment
                    .as_ref()
                    .is_some_and(|h| h.order_id != order_id)
                {
                    self.session.active_payment = None;
                }
                self.session.pending_order_id = Some(order_id);
                self.session.phase = if self.session.active_payment.is_some() {
                    PaymentPhase::AwaitingCard
                } else {
                    PaymentPhase::AwaitingInitiation
                };
                self.report(&err);
                return Err(err);
            }
        };

        tracing::info!(
            order_id,
            payment_id = payment.payment_id,
            transaction_id = %payment.transaction_id,
            "payment initiated"
        );

        let handle = payment.handle();
        self.session.pending_order_id = Some(order_id);
        self.session.active_payment = Some(handle.clone());
        self.session.phase = PaymentPhase::AwaitingCard;
        self.events.publish(CheckoutEvent::PaymentInitiated {
            order_id,
            payment_id: handle.payment_id,
            transaction_id: handle.transaction_id.clone(),
        });
        Ok(handle)
    }

    /// "Pay now" for an order placed earlier.
    pub async fn pay_for_order(&mut self, order_id: i64) -> Result<PaymentHandle, CheckoutError> {
        self.initiate_payment(order_id, PaymentMethod::Card).await
    }

    /// Validates the card, waits for the gateway verdict and verifies the
    /// active payment with the order service.
    ///
    /// A failed verification keeps the payment handle so the same payment
    /// can be resubmitted after [`Checkout::retry_payment`].
    pub async fn confirm_payment(
        &mut self,
        card: &CardDetails,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let handle = self
            .session
            .active_payment
            .clone()
            .ok_or(CheckoutError::NoPendingPayment)?;
        if matches!(self.session.phase, PaymentPhase::Failed { .. }) {
            return Err(CheckoutError::validation(
                "Payment failed; retry the payment before resubmitting",
            ));
        }
        card.validate().map_err(CheckoutError::validation)?;
        self.guard.rearm();

        self.session.phase = PaymentPhase::Processing;
        self.events.publish(CheckoutEvent::PaymentProcessing {
            order_id: handle.order_id,
            payment_id: handle.payment_id,
        });

        let verdict = match self
            .guard
            .run("confirm payment", self.gateway.confirm(&handle, card))
            .await
        {
            Ok(v) => v,
            Err(err) => return Err(self.fail_payment(&handle, err)),
        };

        let outcome = match self
            .guard
            .run(
                "verify payment",
                self.api.verify_payment(
                    handle.payment_id,
                    &handle.transaction_id,
                    verdict.success,
                ),
            )
            .await
        {
            Ok(o) => o,
            Err(err) => return self.reconcile_verification(&handle, err).await,
        };

        match outcome.status {
            PaymentStatus::Success => Ok(self.complete_payment(&handle, outcome)),
            PaymentStatus::Failed => {
                // The payment record is spent; a retry needs a new one.
                self.session.active_payment = None;
                self.session
                    .order_status
                    .insert(handle.order_id, OrderStatus::PaymentFailed);
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "declined by gateway".to_string());
                let err = CheckoutError::Declined {
                    transaction_id: outcome.transaction_id,
                    reason,
                };
                Err(self.fail_payment(&handle, err))
            }
            PaymentStatus::Pending => {
                let err = CheckoutError::RemoteCall {
                    operation: "verify payment",
                    source: ApiError::Decode("payment still PENDING after verification".into()),
                };
                Err(self.fail_payment(&handle, err))
            }
        }
    }

    fn complete_payment(&mut self, handle: &PaymentHandle, outcome: PaymentOutcome) -> PaymentOutcome {
        tracing::info!(
            order_id = handle.order_id,
            payment_id = handle.payment_id,
            transaction_id = %outcome.transaction_id,
            "payment verified, order confirmed"
        );
        self.session
            .order_status
            .insert(handle.order_id, OrderStatus::Confirmed);
        self.session.active_payment = None;
        self.session.phase = PaymentPhase::Succeeded {
            transaction_id: outcome.transaction_id.clone(),
        };
        self.events.publish(CheckoutEvent::OrderConfirmed {
            order_id: handle.order_id,
            payment_id: handle.payment_id,
            transaction_id: outcome.transaction_id.clone(),
        });
        outcome
    }

    /// A verify that timed out may still have been applied, and a 409 means
    /// the payment was already settled. Either way the order listing is the
    /// source of truth for what happened.
    async fn reconcile_verification(
        &mut self,
        handle: &PaymentHandle,
        err: CheckoutError,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let settled = matches!(
            &err,
            CheckoutError::RemoteCall { source, .. } if source.status_code() == Some(409)
        );
        let timed_out = matches!(&err, CheckoutError::Timeout { .. });
        let user_id = match self.session.user.as_ref().map(|u| u.id) {
            Some(id) if settled || timed_out => id,
            _ => return Err(self.fail_payment(handle, err)),
        };

        let status = match self
            .guard
            .run("list orders", self.api.list_orders(user_id))
            .await
        {
            Ok(orders) => orders
                .into_iter()
                .find(|o| o.order_id == handle.order_id)
                .map(|o| o.status),
            Err(lookup) => {
                tracing::debug!(order_id = handle.order_id, error = %lookup, "could not reconcile payment");
                None
            }
        };
        if let Some(status) = status {
            self.session.order_status.insert(handle.order_id, status);
        }

        if status == Some(OrderStatus::Confirmed) {
            tracing::info!(
                order_id = handle.order_id,
                payment_id = handle.payment_id,
                "verification was applied remotely"
            );
            let outcome = PaymentOutcome {
                payment_id: handle.payment_id,
                order_id: handle.order_id,
                transaction_id: handle.transaction_id.clone(),
                status: PaymentStatus::Success,
            };
            return Ok(self.complete_payment(handle, outcome));
        }
        if settled {
            // The payment record is spent; a retry needs a new one.
            self.session.active_payment = None;
        }
        Err(self.fail_payment(handle, err))
    }

    fn fail_payment(&mut self, handle: &PaymentHandle, err: CheckoutError) -> CheckoutError {
        tracing::warn!(
            order_id = handle.order_id,
            payment_id = handle.payment_id,
            error = %err,
            "payment failed"
        );
        self.session.phase = PaymentPhase::Failed {
            reason: err.to_string(),
        };
        self.events.publish(CheckoutEvent::PaymentFailed {
            order_id: handle.order_id,
            reason: err.user_message(),
            retryable: true,
        });
        err
    }

    /// Reopens the payment form after a failure. Never resubmits on its own.
    pub fn retry_payment(&mut self) -> Result<(), CheckoutError> {
        if !matches!(self.session.phase, PaymentPhase::Failed { .. }) {
            return Err(CheckoutError::validation("No failed payment to retry"));
        }
        self.session.phase = if self.session.active_payment.is_some() {
            PaymentPhase::AwaitingCard
        } else {
            PaymentPhase::AwaitingInitiation
        };
        if let Some(order_id) = self.session.pending_order_id {
            self.events
                .publish(CheckoutEvent::PaymentRetryReady { order_id });
        }
        Ok(())
    }

    /// Abandons the payment form. The order stays payable remotely.
    pub fn close_payment(&mut self) {
        self.session.pending_order_id = None;
        self.session.active_payment = None;
        self.session.phase = PaymentPhase::Idle;
        self.events.publish(CheckoutEvent::PaymentClosed);
    }

    pub async fn load_orders(&mut self) -> Result<Vec<Order>, CheckoutError> {
        let user_id = self.require_user()?;
        self.guard.rearm();
        let orders = match self
            .guard
            .run("list orders", self.api.list_orders(user_id))
            .await
        {
            Ok(o) => o,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };
        for o in &orders {
            self.session.order_status.insert(o.order_id, o.status);
        }
        tracing::debug!(user_id, count = orders.len(), "orders loaded");
        self.events
            .publish(CheckoutEvent::OrdersLoaded { count: orders.len() });
        Ok(orders)
    }
}
