//! Note ledger use-case service.
//!
//! # Responsibility
//! - Expose create/status/delete use-cases over a `NoteRepository`.
//! - Translate repository failures into the ledger error vocabulary.
//!
//! # Invariants
//! - A failed create leaves every product quantity unchanged.
//! - Status changes never touch note code, lines or total.
//! - Log lines carry ids and counts only, never customer text.

use crate::model::note::{NoteDraft, NoteId, NoteStatus, NoteValidationError};
use crate::model::product::ProductId;
use crate::repo::catalog_repo::RepoError;
use crate::repo::note_repo::NoteRepository;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ledger use-case error.
#[derive(Debug)]
pub enum LedgerError {
    /// Draft or status input rejected before storage was touched.
    Validation(NoteValidationError),
    UnknownProduct(ProductId),
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },
    NoteNotFound(NoteId),
    /// Another writer held the database past the busy timeout.
    ConcurrencyConflict,
    Repo(RepoError),
    /// Write succeeded but the read-back disagrees with it.
    InconsistentState(&'static str),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid note: {err}"),
            Self::UnknownProduct(id) => write!(f, "unknown product: {id}"),
            Self::InsufficientStock {
                product_id,
                requested,
                on_hand,
            } => write!(
                f,
                "insufficient stock for product {product_id}: requested {requested}, on hand {on_hand}"
            ),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::ConcurrencyConflict => {
                write!(f, "note commit conflicted with a concurrent writer")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent ledger state: {details}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for LedgerError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NoteValidation(err) => Self::Validation(err),
            RepoError::UnknownProduct(id) => Self::UnknownProduct(id),
            RepoError::InsufficientStock {
                product_id,
                requested,
                on_hand,
            } => Self::InsufficientStock {
                product_id,
                requested,
                on_hand,
            },
            RepoError::NoteNotFound(id) => Self::NoteNotFound(id),
            RepoError::ConcurrencyConflict => Self::ConcurrencyConflict,
            other => Self::Repo(other),
        }
    }
}

impl LedgerError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownProduct(_) => "unknown_product",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::NoteNotFound(_) => "note_not_found",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::Repo(_) => "repo",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}

/// Ledger facade over repository implementations.
pub struct LedgerService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> LedgerService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the underlying repository for read paths.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Validates and commits one draft, decrementing stock for every line.
    pub fn create_note(&self, draft: &NoteDraft) -> Result<NoteId, LedgerError> {
        let line_count = draft.lines.len();
        let note = match self.repo.commit_note(draft) {
            Ok(note) => note,
            Err(err) => {
                let err = LedgerError::from(err);
                warn!(
                    "event=note_create module=ledger status=rejected lines={line_count} kind={}",
                    err.kind()
                );
                return Err(err);
            }
        };

        if note.status != NoteStatus::INITIAL {
            return Err(LedgerError::InconsistentState(
                "committed note does not start in created status",
            ));
        }

        info!(
            "event=note_create module=ledger status=ok note_id={} lines={line_count}",
            note.id
        );
        Ok(note.id)
    }

    /// Moves a note to `status` through the transition check.
    pub fn update_status(&self, id: NoteId, status: NoteStatus) -> Result<(), LedgerError> {
        self.repo.update_status(id, status).map_err(|err| {
            let err = LedgerError::from(err);
            warn!(
                "event=note_status module=ledger status=rejected note_id={id} kind={}",
                err.kind()
            );
            err
        })?;
        info!(
            "event=note_status module=ledger status=ok note_id={id} code={}",
            status.code()
        );
        Ok(())
    }

    /// Raw numeric-code entry point for callers holding persisted codes.
    pub fn update_status_code(&self, id: NoteId, code: i64) -> Result<(), LedgerError> {
        let status = NoteStatus::from_code(code)
            .ok_or(LedgerError::Validation(NoteValidationError::UnknownStatusCode(code)))?;
        self.update_status(id, status)
    }

    /// Deletes the note and its lines. Product quantities are not restored.
    pub fn delete_note(&self, id: NoteId) -> Result<(), LedgerError> {
        self.repo.delete_note(id)?;
        info!("event=note_delete module=ledger status=ok note_id={id}");
        Ok(())
    }
}
