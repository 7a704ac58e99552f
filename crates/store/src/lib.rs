//! Identity-store ports and the in-memory implementation.
//!
//! Each flow accepts the narrow trait it needs (actors, sessions, roles,
//! …) rather than a store handle, so the core stays testable with
//! in-process doubles and a networked row store can be swapped in behind
//! the same ports. [`MemoryStore`] implements every port under a single
//! lock, which is what makes its multi-step operations (session
//! rotation, conditional consumes) atomic.

pub mod memory;
pub mod ports;

pub use memory::MemoryStore;
pub use ports::*;
