//! Binary RPC transport.
//!
//! Same validator, same authorization engine, same error taxonomy as
//! the textual surface; only the wire differs.

mod server;

pub use server::serve;
