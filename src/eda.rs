use crate::error::{PipelineError, Result};
use crate::tabular::{column_f64_values, numeric_column_names};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::info;

const HISTOGRAM_BINS: usize = 30;
const PANEL_WIDTH: u32 = 420;
const PANEL_HEIGHT: u32 = 360;

/// Renders the exploratory plots for the cleaned table into `eda_dir`:
/// per-column histograms, per-column boxplots, and a correlation heatmap
/// (the heatmap only when at least two numeric columns exist).
pub fn render_eda_plots(df: &DataFrame, eda_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(eda_dir)?;
    let numeric = numeric_column_names(df);
    let mut written = Vec::new();

    if !numeric.is_empty() {
        let path = eda_dir.join("numeric_histograms.png");
        render_histograms(df, &numeric, &path)?;
        info!("Numeric histograms saved to '{}'", path.display());
        written.push(path);

        let path = eda_dir.join("numeric_boxplots.png");
        render_boxplots(df, &numeric, &path)?;
        info!("Numeric boxplots saved to '{}'", path.display());
        written.push(path);
    }

    if numeric.len() > 1 {
        let path = eda_dir.join("correlation_heatmap.png");
        render_correlation_heatmap(df, &numeric, &path)?;
        info!("Correlation heatmap saved to '{}'", path.display());
        written.push(path);
    }

    Ok(written)
}

fn plot_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Plot(e.to_string())
}

fn render_histograms(df: &DataFrame, columns: &[String], path: &Path) -> Result<()> {
    let width = PANEL_WIDTH * columns.len() as u32;
    let root = BitMapBackend::new(path, (width, PANEL_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((1, columns.len()));

    for (panel, name) in panels.iter().zip(columns) {
        let values = column_f64_values(df, name)?;
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            continue;
        }
        let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };
        let bin_width = span / HISTOGRAM_BINS as f64;

        let mut counts = vec![0usize; HISTOGRAM_BINS];
        for value in &finite {
            let mut bin = ((value - min) / bin_width) as usize;
            if bin >= HISTOGRAM_BINS {
                bin = HISTOGRAM_BINS - 1;
            }
            counts[bin] += 1;
        }
        let tallest = counts.iter().copied().max().unwrap_or(1).max(1);

        let mut chart = ChartBuilder::on(panel)
            .caption(format!("Distribution of {name}"), ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(min..(min + span), 0usize..tallest + 1)
            .map_err(plot_err)?;
        chart.configure_mesh().draw().map_err(plot_err)?;

        chart
            .draw_series(counts.iter().enumerate().map(|(i, count)| {
                let x0 = min + i as f64 * bin_width;
                let x1 = x0 + bin_width;
                Rectangle::new([(x0, 0), (x1, *count)], BLUE.mix(0.6).filled())
            }))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

fn render_boxplots(df: &DataFrame, columns: &[String], path: &Path) -> Result<()> {
    let width = PANEL_WIDTH * columns.len() as u32;
    let root = BitMapBackend::new(path, (width, PANEL_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((1, columns.len()));

    for (panel, name) in panels.iter().zip(columns) {
        let values = column_f64_values(df, name)?;
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            continue;
        }
        let quartiles = Quartiles::new(&finite);
        let min = finite.iter().cloned().fold(f64::INFINITY, f64::min) as f32;
        let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max) as f32;
        let pad = ((max - min).abs() * 0.1).max(0.5);

        let labels = [name.as_str()];
        let mut chart = ChartBuilder::on(panel)
            .caption(format!("Boxplot of {name}"), ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(labels[..].into_segmented(), (min - pad)..(max + pad))
            .map_err(plot_err)?;
        chart.configure_mesh().disable_x_mesh().draw().map_err(plot_err)?;

        chart
            .draw_series(std::iter::once(
                Boxplot::new_vertical(SegmentValue::CenterOf(&labels[0]), &quartiles)
                    .width(40)
                    .style(BLUE),
            ))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

fn render_correlation_heatmap(df: &DataFrame, columns: &[String], path: &Path) -> Result<()> {
    let series: Vec<Vec<f64>> = columns
        .iter()
        .map(|name| column_f64_values(df, name))
        .collect::<Result<_>>()?;
    let n = series.len();

    let root = BitMapBackend::new(path, (900, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation Heatmap", ("sans-serif", 24))
        .margin(40)
        .x_label_area_size(120)
        .y_label_area_size(120)
        .build_cartesian_2d(0..n, 0..n)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|i| columns.get(*i).cloned().unwrap_or_default())
        .y_label_formatter(&|i| columns.get(*i).cloned().unwrap_or_default())
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series((0..n).flat_map(|row| {
            let series = &series;
            (0..n).map(move |col| {
                let r = pearson(&series[row], &series[col]);
                Rectangle::new([(col, row), (col + 1, row + 1)], correlation_color(r).filled())
            })
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Pearson correlation of two equally long samples; 0 when either side is
/// constant.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Maps correlation in [-1, 1] onto a blue → white → red ramp.
fn correlation_color(r: f64) -> RGBColor {
    let r = r.clamp(-1.0, 1.0);
    if r >= 0.0 {
        let t = r;
        RGBColor(255, (255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8)
    } else {
        let t = -r;
        RGBColor((255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn renders_all_three_plots_for_numeric_frames() {
        let df = DataFrame::new(vec![
            Series::new("age", &[25.0f64, 31.0, 44.0, 52.0, 29.0, 38.0]),
            Series::new("length_of_service", &[1.0f64, 4.0, 12.0, 20.0, 3.0, 9.0]),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = render_eda_plots(&df, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        for path in written {
            assert!(path.is_file());
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn skips_heatmap_with_a_single_numeric_column() {
        let df = DataFrame::new(vec![Series::new("age", &[25.0f64, 31.0, 44.0])]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let written = render_eda_plots(&df, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(!dir.path().join("correlation_heatmap.png").exists());
    }

    #[test]
    fn pearson_of_identical_series_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&a, &a) - 1.0).abs() < 1e-12);
        let constant = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(pearson(&a, &constant), 0.0);
    }
}
