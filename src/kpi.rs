use log::{debug, info, warn};
use serde::Serialize;

use crate::error::KpiError;
use crate::record::{Column, RecordSet, Value};

pub const YEAR: &str = "year";
pub const SALES: &str = "sales";
pub const OPERATING_INCOME: &str = "operating_income";
pub const OPERATING_MARGIN: &str = "operating_margin";
pub const OPERATING_DEPRECIATION_AMORTIZATION: &str = "operating_depreciation_amortization";
pub const NON_OPERATING_COSTS: &str = "non_operating_costs";
pub const OPERATING_CASH_FLOW: &str = "operating_cash_flow";
pub const FREE_CASH_FLOW: &str = "free_cash_flow";
pub const EBIT: &str = "ebit";
pub const CAPITAL_EMPLOYED: &str = "capital_employed";

/// Every input field the calculator understands, by normalized name
pub const RECOGNIZED_FIELDS: [&str; 10] = [
    YEAR,
    SALES,
    OPERATING_INCOME,
    OPERATING_MARGIN,
    OPERATING_DEPRECIATION_AMORTIZATION,
    NON_OPERATING_COSTS,
    OPERATING_CASH_FLOW,
    FREE_CASH_FLOW,
    EBIT,
    CAPITAL_EMPLOYED,
];

/// Derived financial ratios
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    /// operating income + depreciation/amortization + non-operating costs
    Ebitda,
    /// free cash flow as a percentage of operating cash flow
    FreeCashFlowConversion,
    /// return on capital employed, EBIT as a percentage of capital employed
    Roce,
}

impl Kpi {
    /// Evaluation order, which is also the order derived columns are appended in
    pub const ALL: [Kpi; 3] = [Kpi::Ebitda, Kpi::FreeCashFlowConversion, Kpi::Roce];

    pub fn column_name(&self) -> &'static str {
        match self {
            Kpi::Ebitda => "ebitda",
            Kpi::FreeCashFlowConversion => "free_cash_flow_conversion",
            Kpi::Roce => "roce",
        }
    }

    /// Normalized names of the columns the rule needs
    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            Kpi::Ebitda => &[
                OPERATING_INCOME,
                OPERATING_DEPRECIATION_AMORTIZATION,
                NON_OPERATING_COSTS,
            ],
            Kpi::FreeCashFlowConversion => &[FREE_CASH_FLOW, OPERATING_CASH_FLOW],
            Kpi::Roce => &[EBIT, CAPITAL_EMPLOYED],
        }
    }

    pub fn applies_to(&self, table: &RecordSet) -> bool {
        self.inputs().iter().all(|name| table.has_column(name))
    }

    /// Computes one row. `args` is in `inputs()` order.
    ///
    /// Returns `None` when a ratio's denominator is zero.
    fn evaluate(&self, args: &[f64]) -> Option<f64> {
        match self {
            Kpi::Ebitda => Some(args.iter().sum()),
            Kpi::FreeCashFlowConversion | Kpi::Roce => percentage(args[0], args[1]),
        }
    }

    /// Builds the derived column for `table`, or `None` if an input is absent
    fn derive(&self, table: &RecordSet) -> Option<Column> {
        let inputs: Vec<&Column> = self
            .inputs()
            .iter()
            .map(|name| table.column(name))
            .collect::<Option<_>>()?;

        let mut args = Vec::with_capacity(inputs.len());
        let mut zero_denominators = 0;
        let values = (0..table.row_count())
            .map(|row| {
                args.clear();
                for column in &inputs {
                    match column.values[row].as_number() {
                        Some(n) => args.push(n),
                        None => return Value::Empty,
                    }
                }
                match self.evaluate(&args) {
                    Some(n) => Value::Number(n),
                    None => {
                        zero_denominators += 1;
                        Value::Empty
                    }
                }
            })
            .collect();

        if zero_denominators > 0 {
            warn!(
                "{}: {} row(s) have a zero denominator, left blank",
                self.column_name(),
                zero_denominators
            );
        }

        Some(Column::new(self.column_name(), values))
    }
}

fn percentage(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator * 100.0)
    }
}

/// Canonical form of a column name: surrounding whitespace removed, lowercase
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalizes the column names of `table` and appends every KPI whose inputs
/// are present.
///
/// Each rule is checked on its own; a missing input only skips that rule.
/// If the table already has a column named after a KPI that fires, its values
/// are replaced where it stands.
///
/// # Returns
/// * The KPIs that were derived, in evaluation order
///
/// # Errors
/// * `KpiError::ColumnConflict` if two columns normalize to the same name.
///   The table is unchanged in that case.
///
/// # Examples
/// ```
/// use kpi_sheet::kpi::{Kpi, calculate_kpis};
/// use kpi_sheet::record::{Column, RecordSet};
///
/// let mut table = RecordSet::with_rows(1);
/// table.push_column(Column::numbers(" EBIT", &[50.0])).unwrap();
/// table.push_column(Column::numbers("Capital_Employed ", &[200.0])).unwrap();
///
/// let derived = calculate_kpis(&mut table).unwrap();
/// assert_eq!(derived, vec![Kpi::Roce]);
/// assert_eq!(table.column("roce").unwrap().values[0].as_number(), Some(25.0));
/// ```
pub fn calculate_kpis(table: &mut RecordSet) -> Result<Vec<Kpi>, KpiError> {
    table.normalize_column_names()?;

    let mut derived = Vec::new();
    for kpi in Kpi::ALL {
        if !kpi.applies_to(table) {
            debug!(
                "skipping {}: needs {}",
                kpi.column_name(),
                kpi.inputs().join(", ")
            );
            continue;
        }
        if let Some(column) = kpi.derive(table) {
            table.set_column(column)?;
            derived.push(kpi);
        }
    }

    info!(
        "derived {} KPI column(s) over {} row(s)",
        derived.len(),
        table.row_count()
    );
    Ok(derived)
}
