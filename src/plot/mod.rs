//! Cost-vs-size chart rendering.
//!
//! One line per source (bucket size on a log x-axis, mean deviation on the
//! y-axis), written as a single PNG.
//!
//! The chart is data-driven: series and bounds are computed by small pure
//! helpers so they can be tested without touching a drawing backend.

use std::path::Path;

use plotters::prelude::*;
use plotters::style::FontStyle;

use crate::domain::{AggregateTable, RunConfig, SizeBuckets, TradeSource};
use crate::error::AppError;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;

fn source_color(source: TradeSource) -> RGBColor {
    match source {
        TradeSource::UniswapV2 => RGBColor(214, 69, 65),
        TradeSource::UniswapV3 => RGBColor(31, 119, 180),
        TradeSource::Cowswap => RGBColor(44, 160, 44),
    }
}

/// Render the aggregated table to `path`.
///
/// Buckets with fewer than `config.min_samples` samples are dropped first;
/// if nothing remains across all sources there is no chart to draw and the
/// run fails rather than emitting an empty image.
pub fn render_cost_chart(
    path: &Path,
    table: &AggregateTable,
    config: &RunConfig,
) -> Result<(), AppError> {
    let series = build_series(table, &config.buckets, config.min_samples);
    if series.is_empty() {
        return Err(AppError::new(
            3,
            "Nothing to plot: aggregated table has no buckets with enough samples.",
        ));
    }

    register_sans_serif()?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::new(
                    2,
                    format!("Failed to create output directory '{}': {e}", dir.display()),
                )
            })?;
        }
    }

    let (x_range, y_range) = bounds(&series);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let caption = format!(
        "Average execution cost vs. trade size ({}, {})",
        config.pair.label(),
        config.range.label()
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d((x_range.0..x_range.1).log_scale(), y_range.0..y_range.1)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc(format!("Trade size ({}, bucket upper edge)", config.pair.base))
        .y_desc("Mean deviation from reference mid")
        .y_label_formatter(&|v| format!("{:.2}%", v * 100.0))
        .draw()
        .map_err(draw_err)?;

    for (source, points) in &series {
        let color = source_color(*source);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), &color))
            .map_err(draw_err)?
            .label(source.display_name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
            )
            .map_err(draw_err)?;
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(|e| {
        AppError::new(2, format!("Failed to write chart '{}': {e}", path.display()))
    })?;

    Ok(())
}

/// Per-source point series in ascending bucket order, low-sample buckets
/// removed. Sources whose every bucket was filtered drop out entirely (and
/// with them their legend entry).
fn build_series(
    table: &AggregateTable,
    buckets: &SizeBuckets,
    min_samples: usize,
) -> Vec<(TradeSource, Vec<(f64, f64)>)> {
    let mut out = Vec::new();
    for source in table.sources() {
        let points: Vec<(f64, f64)> = table
            .rows_for(source)
            .into_iter()
            .filter(|r| r.samples >= min_samples)
            .map(|r| (buckets.representative_size(r.bucket), r.mean_deviation))
            .collect();
        if !points.is_empty() {
            out.push((source, points));
        }
    }
    out
}

/// Padded ((x0, x1), (y0, y1)) bounds over every series point. The x padding
/// is multiplicative because the x-axis is logarithmic.
fn bounds(series: &[(TradeSource, Vec<(f64, f64)>)]) -> ((f64, f64), (f64, f64)) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for (_, points) in series {
        for &(x, y) in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    let (x_min, x_max) = (x_min / 1.5, x_max * 1.5);

    let span = (y_max - y_min).abs();
    let pad = if span < 1e-12 {
        y_max.abs().max(1e-4) * 0.1
    } else {
        span * 0.05
    };

    ((x_min, x_max), (y_min - pad, y_max + pad))
}

/// `ab_glyph` has no system-font discovery, so a face must be registered
/// before any text is drawn. We look for a common sans-serif TTF and leak
/// its bytes (registration requires `'static`). Registration happens once
/// per process.
fn register_sans_serif() -> Result<(), AppError> {
    use std::sync::OnceLock;

    const CANDIDATES: [&str; 6] = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial Unicode.ttf",
    ];

    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            for path in CANDIDATES {
                let Ok(bytes) = std::fs::read(path) else {
                    continue;
                };
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if plotters::style::register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                    return Ok(());
                }
            }
            Err("No usable sans-serif TTF found in the standard font directories.".to_string())
        })
        .clone()
        .map_err(|m| AppError::new(2, m))
}

fn draw_err(e: impl std::fmt::Display) -> AppError {
    AppError::new(2, format!("Chart rendering failed: {e}"))
}
