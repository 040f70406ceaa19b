//! Note ledger persistence.
//!
//! # Responsibility
//! - Commit validated drafts as one atomic unit together with the catalog
//!   quantity decrements they imply.
//! - Serve note reads, listings and status aggregates.
//!
//! # Invariants
//! - `commit_note` either writes the note, every line and every decrement, or
//!   writes nothing.
//! - Stock checks and decrements run inside the same `IMMEDIATE` transaction.
//! - Deleting a note cascades its lines and leaves product quantities as-is.

use crate::model::note::{
    lines_total, Note, NoteDraft, NoteId, NoteLine, NoteStatus, NoteValidationError, NoteWithLines,
    ProductSnapshot, ResolvedLine,
};
use crate::model::product::Product;
use crate::repo::catalog_repo::{decrement_quantity_on, load_product, RepoError, RepoResult};
use crate::repo::{ensure_schema, now_epoch_ms, parse_decimal, parse_uuid};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    code,
    creator_name,
    customer_name,
    customer_address,
    reason,
    status,
    total,
    created_at
FROM notes";

const NOTE_TABLES: &[(&str, &[&str])] = &[
    ("products", &["id", "quantity", "price"]),
    (
        "notes",
        &[
            "id",
            "code",
            "creator_name",
            "customer_name",
            "customer_address",
            "reason",
            "status",
            "total",
            "created_at",
        ],
    ),
    (
        "note_lines",
        &[
            "id",
            "note_id",
            "product_id",
            "line_no",
            "quantity",
            "unit_price",
            "subtotal",
        ],
    ),
];

/// Inclusive creation-time window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedRange {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl CreatedRange {
    pub fn new(from_ms: i64, to_ms: i64) -> Self {
        Self { from_ms, to_ms }
    }

    /// Covers every instant of the UTC calendar days `from..=to`.
    pub fn from_dates(from: NaiveDate, to: NaiveDate) -> Self {
        let from_ms = Utc
            .from_utc_datetime(&from.and_time(NaiveTime::MIN))
            .timestamp_millis();
        let to_ms = match to.succ_opt() {
            Some(next_day) => {
                Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN))
                    .timestamp_millis()
                    - 1
            }
            None => i64::MAX,
        };
        Self { from_ms, to_ms }
    }

    pub fn contains(&self, epoch_ms: i64) -> bool {
        self.from_ms <= epoch_ms && epoch_ms <= self.to_ms
    }
}

/// Filter shared by note listings and counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Case-insensitive substring match on note code. Blank means no filter.
    pub code_contains: Option<String>,
    pub created_between: Option<CreatedRange>,
}

/// Listing order by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteSort {
    #[default]
    Newest,
    Oldest,
}

/// Query options for note listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    pub filter: NoteFilter,
    pub sort: NoteSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for note ledger operations.
pub trait NoteRepository {
    /// Validates and atomically commits a draft, decrementing stock.
    fn commit_note(&self, draft: &NoteDraft) -> RepoResult<Note>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn get_note_with_lines(&self, id: NoteId) -> RepoResult<Option<NoteWithLines>>;
    fn update_status(&self, id: NoteId, status: NoteStatus) -> RepoResult<()>;
    /// Deletes the note and its lines. Stock is not restored.
    fn delete_note(&self, id: NoteId) -> RepoResult<()>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    fn count_notes(&self, filter: &NoteFilter) -> RepoResult<u64>;
    fn count_by_status(&self, status: NoteStatus) -> RepoResult<u64>;
    /// Returns whether any note is in one of `statuses`. Empty input is `false`.
    fn any_status_in(&self, statuses: &[NoteStatus]) -> RepoResult<bool>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn, NOTE_TABLES)?;
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn commit_note(&self, draft: &NoteDraft) -> RepoResult<Note> {
        draft.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut products: Vec<Product> = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            match load_product(&tx, line.product_id)? {
                Some(product) => products.push(product),
                None => return Err(RepoError::UnknownProduct(line.product_id)),
            }
        }

        for (line, product) in draft.lines.iter().zip(&products) {
            if line.quantity > product.quantity {
                return Err(RepoError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    on_hand: product.quantity,
                });
            }
        }

        let note_id = Uuid::new_v4();
        let lines: Vec<NoteLine> = draft
            .lines
            .iter()
            .zip(&products)
            .map(|(line, product)| {
                NoteLine::try_new(note_id, product.id, line.quantity, product.price)
            })
            .collect::<Result<_, _>>()?;
        let total = lines_total(&lines).ok_or(NoteValidationError::TotalOverflow)?;

        let header = &draft.header;
        let note = Note {
            id: note_id,
            code: header.code.trim().to_string(),
            creator_name: header.creator_name.trim().to_string(),
            customer_name: header.customer_name.trim().to_string(),
            customer_address: header.customer_address.trim().to_string(),
            reason: header.reason.trim().to_string(),
            created_at: now_epoch_ms(),
            status: NoteStatus::INITIAL,
            total,
        };

        tx.execute(
            "INSERT INTO notes (
                id,
                code,
                creator_name,
                customer_name,
                customer_address,
                reason,
                status,
                total,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
            params![
                note.id.to_string(),
                note.code,
                note.creator_name,
                note.customer_name,
                note.customer_address,
                note.reason,
                note.status.code(),
                note.total.to_string(),
                note.created_at,
            ],
        )?;

        for (line_no, line) in lines.iter().enumerate() {
            tx.execute(
                "INSERT INTO note_lines (
                    id,
                    note_id,
                    product_id,
                    line_no,
                    quantity,
                    unit_price,
                    subtotal
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    line.id.to_string(),
                    line.note_id.to_string(),
                    line.product_id.to_string(),
                    line_no as i64,
                    line.quantity,
                    line.unit_price.to_string(),
                    line.subtotal.to_string(),
                ],
            )?;
            decrement_quantity_on(&tx, line.product_id, line.quantity)?;
        }

        tx.commit()?;
        Ok(note)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        load_note(self.conn, id)
    }

    fn get_note_with_lines(&self, id: NoteId) -> RepoResult<Option<NoteWithLines>> {
        let Some(note) = load_note(self.conn, id)? else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT
                l.id AS line_id,
                l.product_id AS product_id,
                l.quantity AS quantity,
                l.unit_price AS unit_price,
                l.subtotal AS subtotal,
                p.warehouse_id AS warehouse_id,
                p.name AS product_name,
                p.code AS product_code,
                p.price AS current_price
             FROM note_lines l
             INNER JOIN products p ON p.id = l.product_id
             WHERE l.note_id = ?1
             ORDER BY l.line_no ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(parse_resolved_line_row(row, note.id)?);
        }

        let detail = NoteWithLines { note, lines };
        if !detail.is_consistent() {
            return Err(RepoError::InvalidData(format!(
                "note {id} total does not match its lines"
            )));
        }
        Ok(Some(detail))
    }

    fn update_status(&self, id: NoteId, status: NoteStatus) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current_code: Option<i64> = tx
            .query_row(
                "SELECT status FROM notes WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current_code) = current_code else {
            return Err(RepoError::NoteNotFound(id));
        };
        let current = parse_status(current_code)?;
        if !current.can_transition_to(status) {
            return Err(RepoError::NoteValidation(
                NoteValidationError::TransitionNotAllowed {
                    from: current,
                    to: status,
                },
            ));
        }

        tx.execute(
            "UPDATE notes
             SET status = ?2,
                 updated_at = ?3
             WHERE id = ?1;",
            params![id.to_string(), status.code(), now_epoch_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }
        Ok(())
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let (where_sql, mut bind_values) = note_filter_sql(&query.filter);
        let order_sql = match query.sort {
            NoteSort::Newest => "ORDER BY created_at DESC, id DESC",
            NoteSort::Oldest => "ORDER BY created_at ASC, id ASC",
        };
        let mut sql = format!("{NOTE_SELECT_SQL}{where_sql} {order_sql}");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn count_notes(&self, filter: &NoteFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = note_filter_sql(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM notes{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn count_by_status(&self, status: NoteStatus) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE status = ?1;",
            [status.code()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn any_status_in(&self, statuses: &[NoteStatus]) -> RepoResult<bool> {
        if statuses.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM notes WHERE status IN ({placeholders}));"),
            params_from_iter(statuses.iter().map(|status| status.code())),
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn load_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

fn note_filter_sql(filter: &NoteFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut bind_values = Vec::new();

    if let Some(needle) = filter
        .code_contains
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        clauses.push("instr(lower(code), lower(?)) > 0");
        bind_values.push(Value::Text(needle.to_string()));
    }

    if let Some(range) = filter.created_between {
        clauses.push("created_at BETWEEN ? AND ?");
        bind_values.push(Value::Integer(range.from_ms));
        bind_values.push(Value::Integer(range.to_ms));
    }

    if clauses.is_empty() {
        (String::new(), bind_values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), bind_values)
    }
}

fn parse_status(code: i64) -> RepoResult<NoteStatus> {
    NoteStatus::from_code(code)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid status code `{code}` in notes.status")))
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let total_text: String = row.get("total")?;

    Ok(Note {
        id: parse_uuid(&id_text, "notes.id")?,
        code: row.get("code")?,
        creator_name: row.get("creator_name")?,
        customer_name: row.get("customer_name")?,
        customer_address: row.get("customer_address")?,
        reason: row.get("reason")?,
        created_at: row.get("created_at")?,
        status: parse_status(row.get("status")?)?,
        total: parse_decimal(&total_text, "notes.total")?,
    })
}

fn parse_resolved_line_row(row: &Row<'_>, note_id: NoteId) -> RepoResult<ResolvedLine> {
    let line_id: String = row.get("line_id")?;
    let product_id: String = row.get("product_id")?;
    let warehouse_id: String = row.get("warehouse_id")?;
    let unit_price: String = row.get("unit_price")?;
    let subtotal: String = row.get("subtotal")?;
    let current_price: String = row.get("current_price")?;

    let product_id = parse_uuid(&product_id, "note_lines.product_id")?;
    Ok(ResolvedLine {
        line: NoteLine {
            id: parse_uuid(&line_id, "note_lines.id")?,
            note_id,
            product_id,
            quantity: row.get("quantity")?,
            unit_price: parse_decimal(&unit_price, "note_lines.unit_price")?,
            subtotal: parse_decimal(&subtotal, "note_lines.subtotal")?,
        },
        product: ProductSnapshot {
            product_id,
            warehouse_id: parse_uuid(&warehouse_id, "products.warehouse_id")?,
            name: row.get("product_name")?,
            code: row.get("product_code")?,
            current_price: parse_decimal(&current_price, "products.price")?,
        },
    })
}
