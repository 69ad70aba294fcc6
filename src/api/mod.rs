//! HTTP/WebSocket/SSE transport: router assembly, wire types, and the
//! session-cookie middleware that feeds the Engine's channel checks.

mod embedded;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;

pub use server::ApiServer;
