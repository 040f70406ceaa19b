//! Core domain logic for StockNote outbound delivery notes.
//! This crate is the single source of truth for stock and note invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod report;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::note::{
    duplicate_product_ids, DraftLine, Note, NoteDraft, NoteHeader, NoteId, NoteLine, NoteStatus,
    NoteValidationError, NoteWithLines, ProductSnapshot, ResolvedLine,
};
pub use model::product::{
    Product, ProductId, ProductValidationError, ProductWithWarehouse, Warehouse, WarehouseId,
};
pub use repo::catalog_repo::{
    CatalogRepository, ProductListQuery, RepoError, RepoResult, SqliteCatalogRepository,
};
pub use repo::note_repo::{
    CreatedRange, NoteFilter, NoteListQuery, NoteRepository, NoteSort, SqliteNoteRepository,
};
pub use report::{CellValue, ExportError, Sheet};
pub use service::catalog_service::{CatalogService, ProductFilter, ProductPage};
pub use service::ledger_service::{LedgerError, LedgerService};
pub use service::query_service::{NotePage, Page, PageRequest, QueryService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
