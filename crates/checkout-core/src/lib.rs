//! checkout-core: checkout orchestration over the order/payment service

pub mod config;
pub mod errors;
pub mod events;
pub mod session;

pub mod application;

pub use checkout_types::{domain, ports};
