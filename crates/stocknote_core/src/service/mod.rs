//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Apply configured policy (page sizes, low-stock threshold) on top of the
//!   repositories.

pub mod catalog_service;
pub mod ledger_service;
pub mod query_service;
