//! Tabular report exports.
//!
//! # Responsibility
//! - Lay out already-resolved notes and products as sparse cell sheets.
//! - Render sheets as CSV text.
//!
//! # Invariants
//! - Exports read stored snapshot prices and stored totals; nothing is
//!   recomputed from live catalog prices.

pub mod note_export;
pub mod sheet;

pub use note_export::{note_details_sheet, products_sheet, search_results_sheet};
pub use sheet::{CellValue, ExportError, Sheet};
