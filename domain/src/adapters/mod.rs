//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing, local demos and offline development.
//! Real adapters (SQLite, system DNS) live in separate crates.

pub mod memory_repo;
pub mod static_resolver;
