//! Screen-level use-case services.
//!
//! # Responsibility
//! - Translate UI intents into reminder store calls.
//! - Keep UI layers decoupled from storage details.

pub mod events;
pub mod reminder_coordinator;
