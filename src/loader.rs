use calamine::{Data, Reader, Xlsx};
use log::info;
use std::io::Cursor;
use std::path::Path;

use crate::error::KpiError;
use crate::record::{RecordSet, Value};

/// Load a record set from an in-memory xlsx workbook
///
/// Only the first worksheet is read. Its first row becomes the header and
/// every following row a data row. Column names are returned as written in
/// the file; normalization happens in `kpi::calculate_kpis`.
///
/// # Arguments
/// * `bytes` - Raw content of an uploaded `.xlsx` file
///
/// # Returns
/// * `Result<RecordSet, KpiError>` - The loaded table or a parse error
///
/// # Examples
/// ```
/// use kpi_sheet::loader::from_xlsx_bytes;
/// use kpi_sheet::template::sample_workbook;
///
/// let bytes = sample_workbook().unwrap();
/// let table = from_xlsx_bytes(&bytes).unwrap();
/// assert_eq!(table.row_count(), 3);
/// ```
pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<RecordSet, KpiError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;

    // Get the first worksheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(KpiError::NoWorksheet)?;

    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .enumerate()
            .map(|(index, cell)| header_name(index, cell))
            .collect(),
        None => return Ok(RecordSet::default()),
    };

    let data: Vec<Vec<Value>> = rows
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();

    let table = RecordSet::from_rows(header, data);
    info!(
        "loaded sheet '{}': {} row(s), {} column(s)",
        sheet_name,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Load a record set from an xlsx file on disk
///
/// # Examples
/// ```no_run
/// use kpi_sheet::loader::from_xlsx_path;
///
/// match from_xlsx_path("financials.xlsx") {
///     Ok(table) => println!("Loaded {} rows", table.row_count()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_xlsx_path(path: impl AsRef<Path>) -> Result<RecordSet, KpiError> {
    let bytes = std::fs::read(path)?;
    from_xlsx_bytes(&bytes)
}

fn header_name(index: usize, cell: &Data) -> String {
    match cell {
        Data::Empty => format!("Unnamed: {}", index),
        Data::String(s) if s.trim().is_empty() => format!("Unnamed: {}", index),
        other => cell_value(other).to_string(),
    }
}

// Converts a calamine cell into a record value. Formula cells arrive as their
// cached result.
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        // Booleans stay out of the numeric columns
        Data::Bool(b) => Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(s.clone()),
        },
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) | Data::Empty => Value::Empty,
    }
}
