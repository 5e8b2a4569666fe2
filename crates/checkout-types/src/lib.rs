//! checkout-types: domain model and ports shared by the checkout crates

pub mod domain;
pub mod ports;
