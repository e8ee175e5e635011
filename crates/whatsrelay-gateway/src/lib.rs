pub mod bootstrap;
pub mod router;
pub mod server;

pub use server::GatewayServer;
