use thiserror::Error;

/// Errors produced while loading, deriving, exporting or charting a record set.
#[derive(Debug, Error)]
pub enum KpiError {
    /// Two distinct columns normalize to the same name
    #[error("columns '{first}' and '{second}' both normalize to '{normalized}'")]
    ColumnConflict {
        normalized: String,
        first: String,
        second: String,
    },

    #[error("column '{name}' has {actual} values but the record set has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("record set declares {0} rows but has no columns")]
    RowsWithoutColumns(usize),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' is not numeric")]
    NonNumericColumn(String),

    #[error("invalid chart selection: {0}")]
    InvalidChartSelection(String),

    #[error("spreadsheet contains no worksheets")]
    NoWorksheet,

    /// The upload is not a readable xlsx workbook
    #[error("malformed spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("failed to write spreadsheet: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to render chart: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KpiError {
    /// True when the error was caused by the caller's input rather than by
    /// encoding output.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            KpiError::Write(_) | KpiError::Chart(_) | KpiError::Io(_)
        )
    }
}
