use rusqlite::Connection;
use rust_decimal::Decimal;
use stocknote_core::db::open_db_in_memory;
use stocknote_core::{
    CatalogRepository, DraftLine, LedgerError, LedgerService, NoteDraft, NoteHeader,
    NoteRepository, NoteStatus, NoteValidationError, Product, ProductId, SqliteCatalogRepository,
    SqliteNoteRepository, Warehouse,
};
use uuid::Uuid;

fn header(code: &str) -> NoteHeader {
    NoteHeader {
        code: code.to_string(),
        creator_name: "Lan".to_string(),
        customer_name: "Acme Retail".to_string(),
        customer_address: "12 Dock Road".to_string(),
        reason: "order 77".to_string(),
    }
}

fn draft(code: &str, lines: &[(ProductId, i64)]) -> NoteDraft {
    NoteDraft {
        header: header(code),
        lines: lines
            .iter()
            .map(|&(product_id, quantity)| DraftLine::new(product_id, quantity))
            .collect(),
    }
}

fn seed_product(conn: &Connection, code: &str, price: Decimal, quantity: i64) -> ProductId {
    let repo = SqliteCatalogRepository::try_new(conn).unwrap();
    let warehouse = Warehouse::new(format!("WH {code}"), "");
    repo.create_warehouse(&warehouse).unwrap();
    let product = Product::new(warehouse.id, format!("Product {code}"), code, price, quantity);
    repo.create_product(&product).unwrap()
}

fn quantity_of(conn: &Connection, id: ProductId) -> i64 {
    SqliteCatalogRepository::try_new(conn)
        .unwrap()
        .get_product(id)
        .unwrap()
        .unwrap()
        .quantity
}

fn note_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_note_decrements_stock_and_snapshots_total() {
    let conn = open_db_in_memory().unwrap();
    let p1 = seed_product(&conn, "P1", Decimal::new(100, 1), 50);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let note_id = ledger.create_note(&draft("PX-001", &[(p1, 20)])).unwrap();

    assert_eq!(quantity_of(&conn, p1), 30);
    let note = ledger.repo().get_note(note_id).unwrap().unwrap();
    assert_eq!(note.total, Decimal::new(2000, 1));
    assert_eq!(note.total, Decimal::from(200));
    assert_eq!(note.status, NoteStatus::Created);
    assert_eq!(note.code, "PX-001");
    assert!(note.created_at > 0);
}

#[test]
fn multi_line_note_total_matches_subtotals_and_stock_drop() {
    let conn = open_db_in_memory().unwrap();
    let a = seed_product(&conn, "A", Decimal::new(1250, 2), 10);
    let b = seed_product(&conn, "B", Decimal::new(3, 0), 8);
    let c = seed_product(&conn, "C", Decimal::new(99, 2), 100);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let lines = [(a, 4), (b, 8), (c, 33)];
    let before: i64 = [a, b, c].iter().map(|&id| quantity_of(&conn, id)).sum();
    let note_id = ledger.create_note(&draft("PX-002", &lines)).unwrap();
    let after: i64 = [a, b, c].iter().map(|&id| quantity_of(&conn, id)).sum();
    assert_eq!(before - after, 4 + 8 + 33);
    assert_eq!(quantity_of(&conn, b), 0);

    let detail = ledger
        .repo()
        .get_note_with_lines(note_id)
        .unwrap()
        .unwrap();
    assert!(detail.is_consistent());
    let ordered: Vec<_> = detail.lines.iter().map(|l| l.line.product_id).collect();
    assert_eq!(ordered, vec![a, b, c]);

    let subtotal_sum: Decimal = detail.lines.iter().map(|l| l.line.subtotal).sum();
    assert_eq!(detail.note.total, subtotal_sum);
    assert_eq!(detail.note.total, Decimal::new(10667, 2));
}

#[test]
fn duplicate_products_are_rejected_without_stock_change() {
    let conn = open_db_in_memory().unwrap();
    let p1 = seed_product(&conn, "P1", Decimal::new(100, 1), 50);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let err = ledger
        .create_note(&draft("PX-003", &[(p1, 20), (p1, 5)]))
        .unwrap_err();
    match err {
        LedgerError::Validation(NoteValidationError::DuplicateProducts(ids)) => {
            assert_eq!(ids, vec![p1]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(quantity_of(&conn, p1), 50);
    assert_eq!(note_count(&conn), 0);
}

#[test]
fn unknown_product_rejects_whole_note_even_with_valid_lines() {
    let conn = open_db_in_memory().unwrap();
    let known = seed_product(&conn, "K", Decimal::ONE, 10);
    let unknown = Uuid::new_v4();
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let err = ledger
        .create_note(&draft("PX-004", &[(known, 3), (unknown, 1)]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownProduct(id) if id == unknown));
    assert_eq!(quantity_of(&conn, known), 10);
    assert_eq!(note_count(&conn), 0);
}

#[test]
fn over_request_fails_with_insufficient_stock_and_rolls_back() {
    let conn = open_db_in_memory().unwrap();
    let plenty = seed_product(&conn, "PL", Decimal::ONE, 100);
    let scarce = seed_product(&conn, "SC", Decimal::ONE, 4);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let err = ledger
        .create_note(&draft("PX-005", &[(plenty, 30), (scarce, 5)]))
        .unwrap_err();
    match err {
        LedgerError::InsufficientStock {
            product_id,
            requested,
            on_hand,
        } => {
            assert_eq!(product_id, scarce);
            assert_eq!(requested, 5);
            assert_eq!(on_hand, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(quantity_of(&conn, plenty), 100);
    assert_eq!(quantity_of(&conn, scarce), 4);
    assert_eq!(note_count(&conn), 0);
}

#[test]
fn exact_stock_request_drains_product_to_zero() {
    let conn = open_db_in_memory().unwrap();
    let p = seed_product(&conn, "EX", Decimal::new(5, 0), 7);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    ledger.create_note(&draft("PX-006", &[(p, 7)])).unwrap();
    assert_eq!(quantity_of(&conn, p), 0);

    let err = ledger.create_note(&draft("PX-007", &[(p, 1)])).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { on_hand: 0, .. }));
}

#[test]
fn draft_shape_errors_are_validation_errors() {
    let conn = open_db_in_memory().unwrap();
    let p = seed_product(&conn, "V", Decimal::ONE, 10);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    assert!(matches!(
        ledger.create_note(&draft("PX-008", &[])),
        Err(LedgerError::Validation(NoteValidationError::EmptyLines))
    ));
    assert!(matches!(
        ledger.create_note(&draft("PX-008", &[(p, -2)])),
        Err(LedgerError::Validation(NoteValidationError::NonPositiveQuantity {
            quantity: -2,
            ..
        }))
    ));

    let mut blank = draft("PX-008", &[(p, 1)]);
    blank.header.customer_name = "  ".to_string();
    assert!(matches!(
        ledger.create_note(&blank),
        Err(LedgerError::Validation(NoteValidationError::BlankField(
            "customer name"
        )))
    ));
    assert_eq!(quantity_of(&conn, p), 10);
}

#[test]
fn line_prices_are_snapshots_of_commit_time() {
    let conn = open_db_in_memory().unwrap();
    let p = seed_product(&conn, "SN", Decimal::new(10, 0), 20);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());
    let note_id = ledger.create_note(&draft("PX-009", &[(p, 2)])).unwrap();

    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut product = catalog.get_product(p).unwrap().unwrap();
    product.price = Decimal::new(15, 0);
    catalog.update_product(&product).unwrap();

    let detail = ledger
        .repo()
        .get_note_with_lines(note_id)
        .unwrap()
        .unwrap();
    let line = &detail.lines[0];
    assert_eq!(line.line.unit_price, Decimal::new(10, 0));
    assert_eq!(line.line.subtotal, Decimal::new(20, 0));
    assert_eq!(line.product.current_price, Decimal::new(15, 0));
    assert_eq!(detail.note.total, Decimal::new(20, 0));
}

#[test]
fn header_fields_are_trimmed_on_commit() {
    let conn = open_db_in_memory().unwrap();
    let p = seed_product(&conn, "TR", Decimal::ONE, 5);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    let mut padded = draft("  PX-010  ", &[(p, 1)]);
    padded.header.reason = " restock ".to_string();
    let note_id = ledger.create_note(&padded).unwrap();

    let note = ledger.repo().get_note(note_id).unwrap().unwrap();
    assert_eq!(note.code, "PX-010");
    assert_eq!(note.reason, "restock");
}

#[test]
fn amount_overflow_is_a_validation_error_and_rolls_back() {
    let conn = open_db_in_memory().unwrap();
    let a = seed_product(&conn, "A", Decimal::MAX, 5);
    let b = seed_product(&conn, "B", Decimal::MAX, 5);
    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());

    match ledger.create_note(&draft("PX-BIG-1", &[(a, 2)])) {
        Err(LedgerError::Validation(NoteValidationError::SubtotalOverflow {
            product_id,
            quantity,
        })) => {
            assert_eq!(product_id, a);
            assert_eq!(quantity, 2);
        }
        other => panic!("expected subtotal overflow, got {other:?}"),
    }
    assert!(matches!(
        ledger.create_note(&draft("PX-BIG-2", &[(a, 1), (b, 1)])),
        Err(LedgerError::Validation(NoteValidationError::TotalOverflow))
    ));

    assert_eq!(quantity_of(&conn, a), 5);
    assert_eq!(quantity_of(&conn, b), 5);
    assert_eq!(note_count(&conn), 0);

    let single = ledger.create_note(&draft("PX-BIG-3", &[(a, 1)])).unwrap();
    let note = ledger.repo().get_note(single).unwrap().unwrap();
    assert_eq!(note.total, Decimal::MAX);
    assert_eq!(quantity_of(&conn, a), 4);
}
