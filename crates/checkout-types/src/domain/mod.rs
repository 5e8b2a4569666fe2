pub mod address;
pub mod cart;
pub mod money;
pub mod order;
pub mod payment;
