pub mod server;

pub use server::{SandboxServer, SandboxServerConfig};
