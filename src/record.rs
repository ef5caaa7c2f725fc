use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::KpiError;
use crate::kpi::normalize_column_name;

/// A single cell of a record set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Empty,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without a trailing ".0" so years read as years
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Empty => Ok(()),
        }
    }
}

/// A named column of values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn numbers(name: impl Into<String>, values: &[f64]) -> Self {
        Column::new(name, values.iter().copied().map(Value::Number).collect())
    }

    /// A column is numeric when it holds at least one number and nothing
    /// but numbers and blanks.
    pub fn is_numeric(&self) -> bool {
        let mut seen_number = false;
        for value in &self.values {
            match value {
                Value::Number(_) => seen_number = true,
                Value::Empty => {}
                Value::Text(_) => return false,
            }
        }
        seen_number
    }
}

/// In-memory table built from an upload or from the sample template.
///
/// Storage is columnar. Every column holds exactly `rows` values and
/// columns keep their insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecordSet")]
pub struct RecordSet {
    columns: Vec<Column>,
    rows: usize,
}

#[derive(Deserialize)]
struct RawRecordSet {
    columns: Vec<Column>,
    rows: usize,
}

impl TryFrom<RawRecordSet> for RecordSet {
    type Error = KpiError;

    fn try_from(raw: RawRecordSet) -> Result<Self, Self::Error> {
        // Lengths are only checked per column, so a column-less table must
        // not claim any rows
        if raw.columns.is_empty() && raw.rows != 0 {
            return Err(KpiError::RowsWithoutColumns(raw.rows));
        }
        let mut set = RecordSet::with_rows(raw.rows);
        for column in raw.columns {
            set.push_column(column)?;
        }
        Ok(set)
    }
}

impl RecordSet {
    /// Creates an empty record set that will hold `rows` rows
    pub fn with_rows(rows: usize) -> Self {
        RecordSet {
            columns: Vec::new(),
            rows,
        }
    }

    /// Builds a record set from a header row and data rows.
    ///
    /// Short rows are padded with `Value::Empty`; cells beyond the header
    /// width are dropped. Header names are kept verbatim, so duplicates are
    /// only rejected once the names are normalized.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(Value::Empty));
            }
        }

        RecordSet {
            columns,
            rows: row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Appends a column, rejecting name clashes and wrong lengths
    pub fn push_column(&mut self, column: Column) -> Result<(), KpiError> {
        if self.has_column(&column.name) {
            return Err(KpiError::DuplicateColumn(column.name));
        }
        self.check_length(&column)?;
        self.columns.push(column);
        Ok(())
    }

    /// Replaces the values of an existing column in place, or appends the
    /// column when no column of that name exists yet.
    pub fn set_column(&mut self, column: Column) -> Result<(), KpiError> {
        self.check_length(&column)?;
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => existing.values = column.values,
            None => self.columns.push(column),
        }
        Ok(())
    }

    fn check_length(&self, column: &Column) -> Result<(), KpiError> {
        if column.values.len() != self.rows {
            return Err(KpiError::LengthMismatch {
                name: column.name.clone(),
                expected: self.rows,
                actual: column.values.len(),
            });
        }
        Ok(())
    }

    /// Trims and lowercases every column name.
    ///
    /// Fails without touching the record set if two columns end up with the
    /// same name.
    pub fn normalize_column_names(&mut self) -> Result<(), KpiError> {
        let normalized: Vec<String> = self
            .columns
            .iter()
            .map(|c| normalize_column_name(&c.name))
            .collect();

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(normalized.len());
        for (index, name) in normalized.iter().enumerate() {
            if let Some(&first) = seen.get(name.as_str()) {
                return Err(KpiError::ColumnConflict {
                    normalized: name.clone(),
                    first: self.columns[first].name.clone(),
                    second: self.columns[index].name.clone(),
                });
            }
            seen.insert(name, index);
        }

        for (column, name) in self.columns.iter_mut().zip(normalized) {
            column.name = name;
        }
        Ok(())
    }

    /// Names of the columns eligible for charting
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Row-major view of the values
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.rows).map(move |r| self.columns.iter().map(|c| &c.values[r]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::from_rows(
            vec![" Year ".to_string(), "SALES".to_string(), "note".to_string()],
            vec![
                vec![Value::Number(2021.0), Value::Number(10.0), Value::Text("a".into())],
                vec![Value::Number(2022.0)],
            ],
        )
    }

    #[test]
    fn from_rows_pads_short_rows() {
        let set = sample();
        assert_eq!(set.row_count(), 2);
        assert_eq!(set.column_count(), 3);
        assert_eq!(set.column("SALES").unwrap().values[1], Value::Empty);
        assert_eq!(set.column("note").unwrap().values[1], Value::Empty);
    }

    #[test]
    fn normalize_renames_in_place_and_keeps_order() {
        let mut set = sample();
        set.normalize_column_names().unwrap();
        assert_eq!(set.column_names(), vec!["year", "sales", "note"]);
        assert_eq!(set.row_count(), 2);
    }

    #[test]
    fn normalize_rejects_collisions_and_leaves_names_alone() {
        let mut set = RecordSet::from_rows(
            vec!["Sales".to_string(), " sales".to_string()],
            vec![vec![Value::Number(1.0), Value::Number(2.0)]],
        );
        let err = set.normalize_column_names().unwrap_err();
        match err {
            KpiError::ColumnConflict {
                normalized,
                first,
                second,
            } => {
                assert_eq!(normalized, "sales");
                assert_eq!(first, "Sales");
                assert_eq!(second, " sales");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(set.column_names(), vec!["Sales", " sales"]);
    }

    #[test]
    fn push_column_checks_length_and_duplicates() {
        let mut set = sample();
        assert!(matches!(
            set.push_column(Column::numbers("x", &[1.0])),
            Err(KpiError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            set.push_column(Column::numbers("SALES", &[1.0, 2.0])),
            Err(KpiError::DuplicateColumn(_))
        ));
        set.push_column(Column::numbers("x", &[1.0, 2.0])).unwrap();
        assert_eq!(set.column_count(), 4);
    }

    #[test]
    fn set_column_replaces_in_place() {
        let mut set = sample();
        set.set_column(Column::numbers("SALES", &[5.0, 6.0])).unwrap();
        assert_eq!(set.column_names(), vec![" Year ", "SALES", "note"]);
        assert_eq!(set.column("SALES").unwrap().values[0], Value::Number(5.0));
    }

    #[test]
    fn numeric_columns_skip_text() {
        let set = sample();
        assert_eq!(set.numeric_columns(), vec![" Year ", "SALES"]);
        let blank = Column::new("blank", vec![Value::Empty, Value::Empty]);
        assert!(!blank.is_numeric());
    }

    #[test]
    fn json_uses_null_for_empty_and_validates_lengths() {
        let set = sample();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["rows"], 2);
        assert!(json["columns"][1]["values"][1].is_null());

        let back: RecordSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);

        let broken = serde_json::json!({
            "columns": [{"name": "a", "values": [1.0]}],
            "rows": 2
        });
        assert!(serde_json::from_value::<RecordSet>(broken).is_err());
    }

    #[test]
    fn json_rejects_rows_without_columns() {
        let err = serde_json::from_str::<RecordSet>(r#"{"columns":[],"rows":5}"#).unwrap_err();
        assert!(err.to_string().contains("no columns"));

        let empty: RecordSet = serde_json::from_str(r#"{"columns":[],"rows":0}"#).unwrap();
        assert_eq!(empty, RecordSet::default());
    }

    #[test]
    fn display_drops_trailing_zero_for_whole_numbers() {
        assert_eq!(Value::Number(2021.0).to_string(), "2021");
        assert_eq!(Value::Number(0.2).to_string(), "0.2");
        assert_eq!(Value::Empty.to_string(), "");
    }
}
