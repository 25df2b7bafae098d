//! Reminder domain model.
//!
//! # Responsibility
//! - Define the live reminder record and its soft-delete shadow copy.
//! - Keep the mapping between both shapes pure and lossless.
//!
//! # Invariants
//! - A `Reminder` with an empty title and an empty note is a discard signal
//!   and is never written by the coordinator.
//! - Deletion moves a row into the shadow table, it never drops data.

pub mod reminder;
