use std::fs;
use std::path::Path;

use plotters::prelude::*;

use crate::error::{FloodSightError, Result};
use crate::session::History;

const CHART_SIZE: (u32, u32) = (800, 450);

fn chart_error<E: std::fmt::Display>(error: E) -> FloodSightError {
    FloodSightError::Chart(error.to_string())
}

/// Value range with a little headroom; flat series get a unit band.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.1 } else { 1.0 };
    (min - pad)..(max + pad)
}

/// Draw the session history as an SVG line chart: rainfall on the left axis,
/// flood risk on the right, one point per run.
pub fn render_history_chart<P: AsRef<Path>>(history: &History, path: P) -> Result<()> {
    if history.is_empty() {
        return Err(FloodSightError::EmptyHistory);
    }
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let records = history.records();
    let last_run = records.len() as u32 + 1;
    let rainfall: Vec<(u32, f64)> = records.iter().map(|r| (r.run as u32, r.rainfall_mm)).collect();
    let risk: Vec<(u32, f64)> = records.iter().map(|r| (r.run as u32, r.flood_risk_pct)).collect();

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Live Prediction Chart", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0u32..last_run, padded_range(rainfall.iter().map(|p| p.1)))
        .map_err(chart_error)?
        .set_secondary_coord(0u32..last_run, padded_range(risk.iter().map(|p| p.1)));

    chart
        .configure_mesh()
        .x_desc("Run Number")
        .y_desc("Rainfall (mm)")
        .x_labels(records.len().min(20) + 2)
        .draw()
        .map_err(chart_error)?;
    chart
        .configure_secondary_axes()
        .y_desc("Flood Risk (%)")
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(LineSeries::new(rainfall.iter().copied(), &BLUE).point_size(4))
        .map_err(chart_error)?
        .label("Rainfall (mm)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_secondary_series(LineSeries::new(risk.iter().copied(), &RED))
        .map_err(chart_error)?
        .label("Flood Risk (%)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_secondary_series(PointSeries::of_element(risk.iter().copied(), 4, &RED, &|coord, size, style| {
            EmptyElement::at(coord) + Rectangle::new([(-size, -size), (size, size)], style.filled())
        }))
        .map_err(chart_error)?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}
