use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;
use std::ops::Range;

use crate::error::KpiError;
use crate::record::RecordSet;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "KPI".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl GraphOptions {
    /// Options titled and labelled after the plotted columns
    pub fn for_columns(x: &str, y: &str, width: u32, height: u32) -> Self {
        Self {
            title: format!("{} by {}", y, x),
            x_label: x.to_string(),
            y_label: y.to_string(),
            width,
            height,
        }
    }
}

/// Extracts the (x, y) pairs to plot
///
/// Both columns must exist, be numeric and differ from each other. Rows
/// where either value is blank are skipped, and the points come back sorted
/// by x so the line is drawn along the x column.
///
/// # Errors
/// * `KpiError::InvalidChartSelection` if `x_column == y_column`
/// * `KpiError::UnknownColumn` if either column is missing
/// * `KpiError::NonNumericColumn` if either column holds text
pub fn chart_points(
    table: &RecordSet,
    x_column: &str,
    y_column: &str,
) -> Result<Vec<(f64, f64)>, KpiError> {
    if x_column == y_column {
        return Err(KpiError::InvalidChartSelection(format!(
            "x and y must be different columns, both are '{}'",
            x_column
        )));
    }

    let numeric_column = |name: &str| {
        let column = table
            .column(name)
            .ok_or_else(|| KpiError::UnknownColumn(name.to_string()))?;
        if !column.is_numeric() {
            return Err(KpiError::NonNumericColumn(name.to_string()));
        }
        Ok(column)
    };
    let xs = numeric_column(x_column)?;
    let ys = numeric_column(y_column)?;

    let mut points: Vec<(f64, f64)> = xs
        .values
        .iter()
        .zip(&ys.values)
        .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(points)
}

/// Renders a line chart of `y_column` against `x_column` as PNG bytes
///
/// Drawing happens in an in-memory RGB buffer which is then PNG-encoded, so
/// no temporary files are involved.
///
/// # Examples
/// ```no_run
/// use kpi_sheet::graph::{GraphOptions, create_line_chart};
/// use kpi_sheet::template::sample_record_set;
///
/// let table = sample_record_set();
/// let png = create_line_chart(&table, "Year", "Sales", &GraphOptions::default()).unwrap();
/// println!("Chart created: {} bytes", png.len());
/// ```
pub fn create_line_chart(
    table: &RecordSet,
    x_column: &str,
    y_column: &str,
    options: &GraphOptions,
) -> Result<Vec<u8>, KpiError> {
    let data = chart_points(table, x_column, y_column)?;

    let mut pixels = vec![0u8; options.width as usize * options.height as usize * 3];
    draw_line_chart(&mut pixels, &data, options).map_err(|e| KpiError::Chart(e.to_string()))?;

    let image = RgbImage::from_raw(options.width, options.height, pixels)
        .ok_or_else(|| KpiError::Chart("pixel buffer does not match chart size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| KpiError::Chart(e.to_string()))?;

    Ok(png.into_inner())
}

fn draw_line_chart(
    pixels: &mut [u8],
    data: &[(f64, f64)],
    options: &GraphOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::with_buffer(pixels, (options.width, options.height))
        .into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = axis_range(data.iter().map(|&(x, _)| x));
    let y_range = axis_range(data.iter().map(|&(_, y)| y));

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(data.iter().copied(), &BLUE))?;
    chart.draw_series(
        data.iter()
            .map(|&point| Circle::new(point, 3, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

// Axis bounds covering every value, widened when the data is a single point
// or a flat line.
fn axis_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if min > max {
        return 0.0..1.0;
    }
    if min == max {
        let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
        return (min - pad)..(max + pad);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}
