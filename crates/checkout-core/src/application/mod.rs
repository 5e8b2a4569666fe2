pub mod cancel;
pub mod checkout;
pub mod gateway;
