//! Note and product sheet layouts.

use crate::model::note::{Note, NoteWithLines};
use crate::model::product::ProductWithWarehouse;
use crate::report::sheet::{ExportError, Sheet};
use chrono::{TimeZone, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DETAIL_LINES_FIRST_ROW: u32 = 11;

/// Formats epoch milliseconds as a UTC timestamp for sheets.
pub fn format_created_at(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(at) => at.format(DATE_FORMAT).to_string(),
        None => epoch_ms.to_string(),
    }
}

/// Header block, product table and a closing "Total of Note:" row.
///
/// Prices come from the line snapshots; the total is the stored note total.
pub fn note_details_sheet(detail: &NoteWithLines) -> Result<Sheet, ExportError> {
    if !detail.is_consistent() {
        return Err(ExportError::InconsistentNote(detail.note.id.to_string()));
    }

    let note = &detail.note;
    let mut sheet = Sheet::new(format!("Note {}", note.code));
    sheet.set(1, 3, "Note Delivery Goods Information")?;

    let header_rows = [
        ("Note Code", note.code.clone()),
        ("Created's Name", note.creator_name.clone()),
        ("Customer", note.customer_name.clone()),
        ("Customer's Address", note.customer_address.clone()),
        ("Reason", note.reason.clone()),
        ("Date Created", format_created_at(note.created_at)),
    ];
    for (row, (label, value)) in (2..).zip(header_rows) {
        sheet.set(row, 1, label)?;
        sheet.set(row, 2, value)?;
    }

    sheet.set(9, 3, "Product to Export")?;
    for (column, title) in (1..).zip(["Product Name", "Product Code", "StockOut", "Price", "Total"]) {
        sheet.set(10, column, title)?;
    }

    let mut row = DETAIL_LINES_FIRST_ROW;
    for resolved in &detail.lines {
        sheet.set(row, 1, resolved.product.name.as_str())?;
        sheet.set(row, 2, resolved.product.code.as_str())?;
        sheet.set(row, 3, resolved.line.quantity)?;
        sheet.set(row, 4, resolved.line.unit_price)?;
        sheet.set(row, 5, resolved.line.subtotal)?;
        row += 1;
    }

    sheet.set(row, 4, "Total of Note:")?;
    sheet.set(row, 5, note.total)?;
    Ok(sheet)
}

/// One row per note with a newline-joined `name: quantity` products column.
pub fn search_results_sheet(notes: &[NoteWithLines]) -> Result<Sheet, ExportError> {
    let mut sheet = Sheet::new("Search Results");
    let titles = [
        "Note Code",
        "Created's Name",
        "Customer",
        "Customer's Address",
        "Reason",
        "Date Created",
        "Products and StockOut",
        "Total",
    ];
    for (column, title) in (1..).zip(titles) {
        sheet.set(1, column, title)?;
    }

    for (row, detail) in (2..).zip(notes) {
        if !detail.is_consistent() {
            return Err(ExportError::InconsistentNote(detail.note.id.to_string()));
        }
        write_note_header(&mut sheet, row, &detail.note)?;
        let products = detail
            .lines
            .iter()
            .map(|resolved| format!("{}: {}", resolved.product.name, resolved.line.quantity))
            .collect::<Vec<_>>()
            .join("\n");
        sheet.set(row, 7, products)?;
        sheet.set(row, 8, detail.note.total)?;
    }
    Ok(sheet)
}

/// Catalog dump: name, price, quantity, code, warehouse.
pub fn products_sheet(products: &[ProductWithWarehouse]) -> Result<Sheet, ExportError> {
    let mut sheet = Sheet::new("Products");
    for (column, title) in (1..).zip([
        "Product's Name",
        "Price",
        "Quantity",
        "Product Code",
        "Warehouse",
    ]) {
        sheet.set(1, column, title)?;
    }

    for (row, entry) in (2..).zip(products) {
        let product = &entry.product;
        sheet.set(row, 1, product.name.as_str())?;
        sheet.set(row, 2, product.price)?;
        sheet.set(row, 3, product.quantity)?;
        sheet.set(row, 4, product.code.as_str())?;
        sheet.set(row, 5, entry.warehouse_name.as_str())?;
    }
    Ok(sheet)
}

fn write_note_header(sheet: &mut Sheet, row: u32, note: &Note) -> Result<(), ExportError> {
    sheet.set(row, 1, note.code.as_str())?;
    sheet.set(row, 2, note.creator_name.as_str())?;
    sheet.set(row, 3, note.customer_name.as_str())?;
    sheet.set(row, 4, note.customer_address.as_str())?;
    sheet.set(row, 5, note.reason.as_str())?;
    sheet.set(row, 6, format_created_at(note.created_at))?;
    Ok(())
}
