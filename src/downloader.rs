use rust_xlsxwriter::Workbook;

use crate::error::KpiError;
use crate::record::{RecordSet, Value};

/// Convert a record set to CSV format
///
/// Writes a header line with the column names followed by one line per row.
/// Fields containing commas, quotes or newlines are quoted, with embedded
/// quotes doubled. Blank values become empty fields.
///
/// # Examples
/// ```
/// use kpi_sheet::downloader::to_csv;
/// use kpi_sheet::record::{Column, RecordSet};
///
/// let mut table = RecordSet::with_rows(1);
/// table.push_column(Column::numbers("year", &[2021.0])).unwrap();
/// assert_eq!(to_csv(&table), "year\n2021\n");
/// ```
pub fn to_csv(table: &RecordSet) -> String {
    let mut csv_content = String::new();

    push_csv_line(&mut csv_content, table.column_names().into_iter());
    for row in table.rows() {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        push_csv_line(&mut csv_content, fields.iter().map(String::as_str));
    }

    csv_content
}

fn push_csv_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Convert a record set to XLSX format
///
/// Produces a workbook with a single worksheet named `sheet_name`. Row 0 holds
/// the column names, followed by the data rows. Blank values leave the cell
/// unwritten.
///
/// # Returns
/// * `Result<Vec<u8>, KpiError>` - XLSX file content as bytes or an error
pub fn to_xlsx(table: &RecordSet, sheet_name: &str) -> Result<Vec<u8>, KpiError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (c, column) in table.columns().iter().enumerate() {
        let col = c as u16;
        worksheet.write_string(0, col, &column.name)?;

        for (r, value) in column.values.iter().enumerate() {
            let row = (r + 1) as u32;
            match value {
                Value::Number(n) => {
                    worksheet.write_number(row, col, *n)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Value::Empty => {}
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Column;

    #[test]
    fn csv_quotes_special_fields_and_blanks_empty() {
        let mut table = RecordSet::with_rows(2);
        table
            .push_column(Column::new(
                "label, long",
                vec![Value::Text("say \"hi\"".into()), Value::Empty],
            ))
            .unwrap();
        table
            .push_column(Column::numbers("roce", &[20.0, 12.5]))
            .unwrap();

        assert_eq!(
            to_csv(&table),
            "\"label, long\",roce\n\"say \"\"hi\"\"\",20\n,12.5\n"
        );
    }

    #[test]
    fn xlsx_output_is_a_zip_container() {
        let mut table = RecordSet::with_rows(1);
        table.push_column(Column::numbers("a", &[1.0])).unwrap();
        let bytes = to_xlsx(&table, "Data").unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn xlsx_rejects_invalid_sheet_names() {
        let table = RecordSet::default();
        assert!(matches!(to_xlsx(&table, "bad/name"), Err(KpiError::Write(_))));
    }
}
