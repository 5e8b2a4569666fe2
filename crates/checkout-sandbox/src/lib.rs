//! checkout-sandbox: in-process order/payment service with the same
//! semantics and routes as the storefront backend, for local runs and tests

pub mod errors;
pub mod http;
pub mod memory;

pub use memory::InMemoryCommerce;
