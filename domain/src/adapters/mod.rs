//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing and local demos. The SQLite mapper
//! lives in its own crate under `adapters/`.

pub mod memory_repo;
