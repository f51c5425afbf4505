//! The gateway core: listener/accept loop, per-connection worker, and the
//! conversion policy (authenticate, resolve, consult the cache, fetch,
//! store, respond).

mod gateway;
mod headers;
mod master;
mod resolve;
mod worker;

pub use gateway::{Gateway, GatewayOutcome};
pub use master::Server;
pub use worker::handle_connection;
