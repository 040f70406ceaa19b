//! Domain model for the catalog and the outbound note ledger.
//!
//! # Responsibility
//! - Define canonical data structures used by ledger business logic.
//! - Keep invariant checks that need no storage next to the data they guard.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Prices and totals are exact decimals; quantities are whole units.

pub mod note;
pub mod product;
