use std::fmt;

use serde::{Deserialize, Serialize};

use super::money::Money;
use super::order::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A funds-collection attempt tied to one order. Retries create new
/// records; only the latest one is considered active by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    pub amount: Money,
    pub transaction_id: String,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn handle(&self) -> PaymentHandle {
        PaymentHandle {
            payment_id: self.payment_id,
            order_id: self.order_id,
            transaction_id: self.transaction_id.clone(),
        }
    }

    pub fn outcome(&self) -> PaymentOutcome {
        PaymentOutcome {
            payment_id: self.payment_id,
            order_id: self.order_id,
            transaction_id: self.transaction_id.clone(),
            status: self.status,
        }
    }
}

/// Proof that a payment was initiated; required to confirm it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub payment_id: i64,
    pub order_id: i64,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub payment_id: i64,
    pub order_id: i64,
    pub transaction_id: String,
    pub status: PaymentStatus,
}

impl PaymentOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

/// Card fields collected by the payment form. They are only checked for
/// presence; nothing here is sent to the order service.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub expiry: String,
    pub cvv: String,
    pub holder_name: String,
}

impl CardDetails {
    pub fn new(
        number: impl Into<String>,
        expiry: impl Into<String>,
        cvv: impl Into<String>,
        holder_name: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            expiry: expiry.into(),
            cvv: cvv.into(),
            holder_name: holder_name.into(),
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("card number", &self.number),
            ("expiry", &self.expiry),
            ("cvv", &self.cvv),
            ("cardholder name", &self.holder_name),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            anyhow::bail!("please fill all card details (missing: {})", missing.join(", "));
        }
        Ok(())
    }

    /// Last four digits of the card number, for logs.
    pub fn last4(&self) -> &str {
        let n = self.number.trim();
        let start = n.char_indices().rev().nth(3).map(|(i, _)| i).unwrap_or(0);
        &n[start..]
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{}", self.last4()))
            .field("expiry", &self.expiry)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}
