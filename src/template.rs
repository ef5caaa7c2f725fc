use crate::downloader::to_xlsx;
use crate::error::KpiError;
use crate::record::{RecordSet, Value};

/// File name offered for the sample download
pub const TEMPLATE_FILE_NAME: &str = "sample_kpi_data.xlsx";

/// Name of the single worksheet in the sample workbook
pub const TEMPLATE_SHEET_NAME: &str = "SampleData";

/// MIME type of `.xlsx` downloads
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// Header spellings as users see them in the downloaded file. Each one
// normalizes to a recognized field.
const SAMPLE_COLUMNS: [(&str, [f64; 3]); 10] = [
    ("Year", [2021.0, 2022.0, 2023.0]),
    ("Sales", [1_000_000.0, 1_200_000.0, 1_350_000.0]),
    ("Operating_Income", [200_000.0, 240_000.0, 270_000.0]),
    ("Operating_Margin", [0.20, 0.20, 0.20]),
    ("Operating_Depreciation_Amortization", [50_000.0, 60_000.0, 65_000.0]),
    ("Non_Operating_Costs", [10_000.0, 12_000.0, 13_000.0]),
    ("Operating_Cash_Flow", [180_000.0, 210_000.0, 230_000.0]),
    ("Free_Cash_Flow", [150_000.0, 175_000.0, 190_000.0]),
    ("EBIT", [200_000.0, 240_000.0, 270_000.0]),
    ("Capital_Employed", [1_000_000.0, 1_100_000.0, 1_150_000.0]),
];

/// The fixed three-year sample data set
pub fn sample_record_set() -> RecordSet {
    let header = SAMPLE_COLUMNS.iter().map(|(name, _)| name.to_string()).collect();
    let rows = (0..3)
        .map(|r| {
            SAMPLE_COLUMNS
                .iter()
                .map(|(_, values)| Value::Number(values[r]))
                .collect()
        })
        .collect();
    RecordSet::from_rows(header, rows)
}

/// The sample data set encoded as an xlsx workbook with one `SampleData` sheet
pub fn sample_workbook() -> Result<Vec<u8>, KpiError> {
    to_xlsx(&sample_record_set(), TEMPLATE_SHEET_NAME)
}
