//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the EQSANS reduction portal.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
