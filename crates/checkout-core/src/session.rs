use std::collections::HashMap;

use checkout_types::domain::cart::Cart;
use checkout_types::domain::order::OrderStatus;
use checkout_types::domain::payment::PaymentHandle;
use checkout_types::ports::session_store::{SessionStore, StoreError};
use serde::{Deserialize, Serialize};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const CURRENT_USER_KEY: &str = "currentUser";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Signed-in user and bearer token, persisted through a [`SessionStore`].
pub struct AuthSession<S: SessionStore> {
    store: S,
    token: Option<String>,
    user: Option<User>,
}

impl<S: SessionStore> AuthSession<S> {
    /// Restores a previous sign-in. Both keys must be present; a stored
    /// user that no longer parses is dropped rather than failing startup.
    pub async fn restore(store: S) -> Result<Self, StoreError> {
        let token = store.get(AUTH_TOKEN_KEY).await?;
        let raw_user = store.get(CURRENT_USER_KEY).await?;
        let user = match raw_user.as_deref().map(serde_json::from_str::<User>) {
            Some(Ok(user)) => Some(user),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "discarding unreadable stored user");
                None
            }
            None => None,
        };
        let (token, user) = match (token, user) {
            (Some(t), Some(u)) => (Some(t), Some(u)),
            _ => (None, None),
        };
        Ok(Self { store, token, user })
    }

    pub async fn login(&mut self, user: User, token: String) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&user).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.store.set(AUTH_TOKEN_KEY, &token).await?;
        self.store.set(CURRENT_USER_KEY, &raw).await?;
        tracing::info!(user_id = user.id, "signed in");
        self.token = Some(token);
        self.user = Some(user);
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), StoreError> {
        self.store.remove(AUTH_TOKEN_KEY).await?;
        self.store.remove(CURRENT_USER_KEY).await?;
        self.token = None;
        self.user = None;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Where the payment form currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PaymentPhase {
    #[default]
    Idle,
    /// An order was placed; no payment has been initiated yet.
    AwaitingInitiation,
    /// A payment is initiated and waiting for card details.
    AwaitingCard,
    Processing,
    Succeeded {
        transaction_id: String,
    },
    Failed {
        reason: String,
    },
}

/// Per-session state held by the checkout orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSession {
    pub user: Option<User>,
    /// A bearer token is held for `user`.
    pub authenticated: bool,
    pub cart: Cart,
    pub pending_order_id: Option<i64>,
    pub active_payment: Option<PaymentHandle>,
    pub phase: PaymentPhase,
    /// Last status seen for each order, from placement, confirmation or
    /// an order listing.
    pub order_status: HashMap<i64, OrderStatus>,
}

impl CheckoutSession {
    pub fn for_user(user: User) -> Self {
        let cart = Cart::new(user.id);
        Self {
            user: Some(user),
            cart,
            ..Self::default()
        }
    }

    pub fn known_status(&self, order_id: i64) -> Option<OrderStatus> {
        self.order_status.get(&order_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_store::memory::MemorySessionStore;

    fn alice() -> User {
        User {
            id: 7,
            name: "Alice".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn login_persists_and_restore_reads_back() {
        let store = MemorySessionStore::new();
        let mut auth = AuthSession::restore(store.clone()).await.unwrap();
        assert!(!auth.is_authenticated());

        auth.login(alice(), "tok".into()).await.unwrap();
        assert!(auth.is_authenticated());

        let restored = AuthSession::restore(store.clone()).await.unwrap();
        assert_eq!(restored.user(), Some(&alice()));
        assert_eq!(restored.token(), Some("tok"));
    }

    #[tokio::test]
    async fn logout_clears_both_keys() {
        let store = MemorySessionStore::new();
        let mut auth = AuthSession::restore(store.clone()).await.unwrap();
        auth.login(alice(), "tok".into()).await.unwrap();
        auth.logout().await.unwrap();

        assert!(store.get(AUTH_TOKEN_KEY).await.unwrap().is_none());
        assert!(store.get(CURRENT_USER_KEY).await.unwrap().is_none());
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn half_stored_or_garbled_session_is_ignored() {
        let store = MemorySessionStore::new();
        store.set(AUTH_TOKEN_KEY, "tok").await.unwrap();
        let auth = AuthSession::restore(store.clone()).await.unwrap();
        assert!(!auth.is_authenticated());

        store.set(CURRENT_USER_KEY, "not json").await.unwrap();
        let auth = AuthSession::restore(store).await.unwrap();
        assert!(auth.token().is_none());
    }

    #[test]
    fn session_for_user_scopes_cart() {
        let session = CheckoutSession::for_user(alice());
        assert_eq!(session.cart.user_id, 7);
        assert_eq!(session.phase, PaymentPhase::Idle);
    }
}
