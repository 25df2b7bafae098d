//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the reminder store contract consumed by the coordinator.
//! - Isolate SQLite query details from coordinator orchestration.
//!
//! # Invariants
//! - Every successful mutation republishes the live reminder list.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod reminder_repo;
