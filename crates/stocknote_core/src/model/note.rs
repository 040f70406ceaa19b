//! Outbound delivery note model.
//!
//! # Responsibility
//! - Define notes, note lines and the draft shape submitted for commit.
//! - Provide the storage-free duplicate-product guard and draft validation.
//! - Define the note status codes and the transition check.
//!
//! # Invariants
//! - A committed note has at least one line and no two lines share a product.
//! - `Note::total` equals the sum of its line subtotals.
//! - `NoteLine::subtotal` equals `quantity * unit_price`, where `unit_price`
//!   is the product price captured at commit time.
//! - Only `status` changes after a note is committed.

use crate::model::product::{ProductId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a delivery note.
pub type NoteId = Uuid;

/// Stable identifier of one note line.
pub type NoteLineId = Uuid;

/// Lifecycle stage of a note.
///
/// Numeric codes are persisted and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    /// Committed; stock has been decremented.
    Created,
    /// Being picked and packed.
    Processing,
    /// Left the warehouse.
    Shipped,
    /// Finished; no further work expected.
    Closed,
}

impl NoteStatus {
    pub const ALL: [NoteStatus; 4] = [
        NoteStatus::Created,
        NoteStatus::Processing,
        NoteStatus::Shipped,
        NoteStatus::Closed,
    ];

    /// Status assigned to every newly committed note.
    pub const INITIAL: NoteStatus = NoteStatus::Created;

    pub fn code(self) -> i64 {
        match self {
            Self::Created => 1,
            Self::Processing => 2,
            Self::Shipped => 3,
            Self::Closed => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Created),
            2 => Some(Self::Processing),
            3 => Some(Self::Shipped),
            4 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns whether a note in this status may move to `next`.
    ///
    /// Every status may currently follow every other one, including itself.
    /// Status updates go through this check so a stricter graph only needs
    /// to change here.
    pub fn can_transition_to(self, _next: NoteStatus) -> bool {
        true
    }
}

/// Validation failures detected before a draft touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Draft carries no lines.
    EmptyLines,
    /// Product ids that appear on more than one line, sorted ascending.
    DuplicateProducts(Vec<ProductId>),
    /// Line quantity is zero or negative.
    NonPositiveQuantity { product_id: ProductId, quantity: i64 },
    /// Required header field is blank after trim.
    BlankField(&'static str),
    /// Raw status code does not map to a known status.
    UnknownStatusCode(i64),
    /// Status transition refused by `NoteStatus::can_transition_to`.
    TransitionNotAllowed { from: NoteStatus, to: NoteStatus },
    /// `quantity * unit_price` does not fit in a `Decimal`.
    SubtotalOverflow { product_id: ProductId, quantity: i64 },
    /// Sum of line subtotals does not fit in a `Decimal`.
    TotalOverflow,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLines => write!(f, "note must contain at least one line"),
            Self::DuplicateProducts(ids) => {
                let joined = ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "products listed more than once: {joined}")
            }
            Self::NonPositiveQuantity {
                product_id,
                quantity,
            } => write!(
                f,
                "line quantity must be positive, got {quantity} for product {product_id}"
            ),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::UnknownStatusCode(code) => write!(f, "unknown note status code: {code}"),
            Self::TransitionNotAllowed { from, to } => {
                write!(f, "status transition {from:?} -> {to:?} is not allowed")
            }
            Self::SubtotalOverflow {
                product_id,
                quantity,
            } => write!(
                f,
                "line amount overflows for product {product_id} at quantity {quantity}"
            ),
            Self::TotalOverflow => write!(f, "note total overflows"),
        }
    }
}

impl Error for NoteValidationError {}

/// Header fields supplied by the note author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteHeader {
    /// Human-readable note code, e.g. `PX-2024-001`.
    pub code: String,
    pub creator_name: String,
    pub customer_name: String,
    pub customer_address: String,
    pub reason: String,
}

impl NoteHeader {
    fn validate(&self) -> Result<(), NoteValidationError> {
        for (field, value) in [
            ("note code", &self.code),
            ("creator name", &self.creator_name),
            ("customer name", &self.customer_name),
            ("customer address", &self.customer_address),
            ("reason", &self.reason),
        ] {
            if value.trim().is_empty() {
                return Err(NoteValidationError::BlankField(field));
            }
        }
        Ok(())
    }
}

/// One requested product/quantity pair of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl DraftLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Proposed note submitted to the ledger for commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub header: NoteHeader,
    /// Requested lines in display order.
    pub lines: Vec<DraftLine>,
}

impl NoteDraft {
    /// Runs every check that needs no catalog access.
    ///
    /// Order: empty line list, duplicate products, line quantities, header.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.lines.is_empty() {
            return Err(NoteValidationError::EmptyLines);
        }

        let duplicates = duplicate_product_ids(&self.lines);
        if !duplicates.is_empty() {
            return Err(NoteValidationError::DuplicateProducts(
                duplicates.into_iter().collect(),
            ));
        }

        if let Some(line) = self.lines.iter().find(|line| line.quantity <= 0) {
            return Err(NoteValidationError::NonPositiveQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        self.header.validate()
    }
}

/// Returns the product ids that occur on more than one line.
///
/// The result does not depend on line order and is sorted ascending.
pub fn duplicate_product_ids(lines: &[DraftLine]) -> BTreeSet<ProductId> {
    let mut seen = HashSet::with_capacity(lines.len());
    let mut duplicates = BTreeSet::new();
    for line in lines {
        if !seen.insert(line.product_id) {
            duplicates.insert(line.product_id);
        }
    }
    duplicates
}

/// Committed delivery note header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub code: String,
    pub creator_name: String,
    pub customer_name: String,
    pub customer_address: String,
    pub reason: String,
    /// Commit time in epoch milliseconds. Set once by the ledger.
    pub created_at: i64,
    pub status: NoteStatus,
    /// Stored sum of line subtotals.
    pub total: Decimal,
}

/// Committed note line with its price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLine {
    pub id: NoteLineId,
    pub note_id: NoteId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Product price at commit time.
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl NoteLine {
    /// Creates a line and derives its subtotal from the price snapshot.
    pub fn try_new(
        note_id: NoteId,
        product_id: ProductId,
        quantity: i64,
        unit_price: Decimal,
    ) -> Result<Self, NoteValidationError> {
        let subtotal = line_subtotal(quantity, unit_price).ok_or(
            NoteValidationError::SubtotalOverflow {
                product_id,
                quantity,
            },
        )?;
        Ok(Self {
            id: Uuid::new_v4(),
            note_id,
            product_id,
            quantity,
            unit_price,
            subtotal,
        })
    }
}

/// `quantity * unit_price`, exact. `None` on overflow.
pub fn line_subtotal(quantity: i64, unit_price: Decimal) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Sum of line subtotals. `None` on overflow.
pub fn lines_total<'a>(lines: impl IntoIterator<Item = &'a NoteLine>) -> Option<Decimal> {
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.subtotal))
}

/// Product data resolved for one note line at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub code: String,
    /// Live catalog price; the historical price is `NoteLine::unit_price`.
    pub current_price: Decimal,
}

/// One note line together with its resolved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLine {
    pub line: NoteLine,
    pub product: ProductSnapshot,
}

/// Note with its ordered lines, used by detail views and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteWithLines {
    pub note: Note,
    pub lines: Vec<ResolvedLine>,
}

impl NoteWithLines {
    /// Returns whether the stored total still matches the stored subtotals.
    pub fn is_consistent(&self) -> bool {
        let total = lines_total(self.lines.iter().map(|resolved| &resolved.line));
        total == Some(self.note.total)
            && self.lines.iter().all(|resolved| {
                line_subtotal(resolved.line.quantity, resolved.line.unit_price)
                    == Some(resolved.line.subtotal)
            })
    }
}
