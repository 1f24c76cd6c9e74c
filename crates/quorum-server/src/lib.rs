pub mod methods;
pub mod rpc;
pub mod server;
