pub mod commerce_api;
pub mod payment_gateway;
pub mod session_store;
