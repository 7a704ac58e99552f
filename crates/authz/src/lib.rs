//! Role→permission authorization engine.
//!
//! The matrix is small, so the engine keeps a read-mostly snapshot in
//! process memory and answers `can()` without touching the store.
//! Mutations write through the role store, bump a version counter, and
//! swap in a fresh snapshot.

mod engine;
mod matrix;

pub use engine::AuthzEngine;
pub use matrix::{Matrix, MatrixExport};
