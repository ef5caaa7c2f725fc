/*!
# KPI Sheet

A browser-based tool that turns a company's financial spreadsheet into a
handful of derived ratios, built in Rust.

## Overview

The user downloads a sample workbook, fills it in (or brings their own), and
uploads it. The application normalizes the column names, derives whichever
KPIs the available columns allow, and shows both tables next to a line chart
of any two numeric columns.

## Pipeline

read file → normalize columns → derive KPIs conditionally → render

### Core
- **record**: `RecordSet`, the columnar in-memory table
- **kpi**: column-name normalization and the KPI derivation rules
- **template**: the fixed three-year sample data set
- **loader**: xlsx import (first sheet, first row as header)
- **downloader**: xlsx and CSV export
- **error**: the crate-wide `KpiError`

### Web (`web` feature)
- **graph**: PNG line charts
- **app**: routing and handlers
- **config**: server settings

## Derived KPIs

| Column | Needs | Formula |
|---|---|---|
| `ebitda` | `operating_income`, `operating_depreciation_amortization`, `non_operating_costs` | sum of the three |
| `free_cash_flow_conversion` | `free_cash_flow`, `operating_cash_flow` | `free_cash_flow / operating_cash_flow * 100` |
| `roce` | `ebit`, `capital_employed` | `ebit / capital_employed * 100` |

Each rule is applied only when all of its input columns are present. A row
with a zero denominator or a missing input gets a blank value.

## REST API Endpoints

- `GET /template` - Sample workbook download (`sample_kpi_data.xlsx`)
- `POST /upload` - HTML report for an uploaded workbook
- `POST /api/kpis` - JSON report for an uploaded workbook
- `POST /api/chart` - PNG chart of two numeric columns
- `POST /api/export?format=csv|xlsx` - Download a table
*/

pub mod downloader;
pub mod error;
pub mod kpi;
pub mod loader;
pub mod record;
pub mod template;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod graph;

pub use error::KpiError;
pub use kpi::{Kpi, calculate_kpis, normalize_column_name};
pub use record::{Column, RecordSet, Value};
