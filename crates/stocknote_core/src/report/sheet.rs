//! Sparse 1-based cell grid.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Export rendering error.
#[derive(Debug)]
pub enum ExportError {
    /// Row or column index was zero.
    InvalidCell { row: u32, column: u32 },
    /// Resolved note failed its total/subtotal consistency check.
    InconsistentNote(String),
    Csv(csv::Error),
    Utf8(std::string::FromUtf8Error),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCell { row, column } => {
                write!(f, "cell ({row}, {column}) is outside the 1-based grid")
            }
            Self::InconsistentNote(id) => {
                write!(f, "note {id} total does not match its lines")
            }
            Self::Csv(err) => write!(f, "csv write failed: {err}"),
            Self::Utf8(err) => write!(f, "csv output is not utf-8: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Csv(err) => Some(err),
            Self::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<std::string::FromUtf8Error> for ExportError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}

/// Typed cell content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
}

impl CellValue {
    pub fn render(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for CellValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

/// Named worksheet with sparse cells addressed as `(row, column)`, both
/// starting at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Writes one cell, replacing any previous value.
    pub fn set(
        &mut self,
        row: u32,
        column: u32,
        value: impl Into<CellValue>,
    ) -> Result<(), ExportError> {
        if row == 0 || column == 0 {
            return Err(ExportError::InvalidCell { row, column });
        }
        self.cells.insert((row, column), value.into());
        Ok(())
    }

    pub fn get(&self, row: u32, column: u32) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    /// Highest used row, or `0` for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|&(row, _)| row).max().unwrap_or(0)
    }

    /// Highest used column, or `0` for an empty sheet.
    pub fn max_column(&self) -> u32 {
        self.cells.keys().map(|&(_, column)| column).max().unwrap_or(0)
    }

    /// Renders the dense `max_row x max_column` rectangle as CSV.
    ///
    /// Missing cells become empty fields.
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let max_column = self.max_column();
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(Vec::new());
        for row in 1..=self.max_row() {
            let record: Vec<String> = (1..=max_column)
                .map(|column| self.get(row, column).map(CellValue::render).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| ExportError::Csv(err.into_error().into()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{CellValue, ExportError, Sheet};
    use rust_decimal::Decimal;

    #[test]
    fn set_rejects_zero_indexes() {
        let mut sheet = Sheet::new("Empty");
        assert!(matches!(
            sheet.set(0, 1, "x"),
            Err(ExportError::InvalidCell { row: 0, column: 1 })
        ));
        assert!(matches!(
            sheet.set(1, 0, "x"),
            Err(ExportError::InvalidCell { row: 1, column: 0 })
        ));
    }

    #[test]
    fn csv_fills_gaps_and_quotes_multiline_text() {
        let mut sheet = Sheet::new("Grid");
        sheet.set(1, 2, "title").expect("set title");
        sheet.set(2, 1, "Cable: 2\nPlug: 1").expect("set multiline");
        sheet.set(2, 3, Decimal::new(2050, 2)).expect("set decimal");

        let csv = sheet.to_csv().expect("render csv");
        assert_eq!(csv, ",title,\n\"Cable: 2\nPlug: 1\",,20.50\n");
    }

    #[test]
    fn empty_sheet_renders_empty_text() {
        let sheet = Sheet::new("Nothing");
        assert_eq!(sheet.max_row(), 0);
        assert_eq!(sheet.to_csv().expect("render empty"), "");
    }

    #[test]
    fn later_writes_replace_cells() {
        let mut sheet = Sheet::new("Overwrite");
        sheet.set(1, 1, 5_i64).expect("set int");
        sheet.set(1, 1, "five").expect("replace");
        assert_eq!(sheet.get(1, 1), Some(&CellValue::Text("five".to_string())));
    }
}
