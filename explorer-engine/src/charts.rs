use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use resvg::{tiny_skia, usvg};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::ExplorerError;
use crate::statistics::CorrelationMatrix;

const FONT: &str = "sans-serif";
const PREFERRED_FAMILIES: [&str; 5] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
];

const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);
const NAN_COLOR: RGBColor = RGBColor(230, 230, 230);
const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Histogram,
    Scatter,
    CorrelationHeatmap,
    Line,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Bar,
        ChartKind::Histogram,
        ChartKind::Scatter,
        ChartKind::CorrelationHeatmap,
        ChartKind::Line,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Histogram => "histogram",
            ChartKind::Scatter => "scatter",
            ChartKind::CorrelationHeatmap => "correlation_heatmap",
            ChartKind::Line => "line",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar chart",
            ChartKind::Histogram => "Histogram",
            ChartKind::Scatter => "Scatter plot",
            ChartKind::CorrelationHeatmap => "Correlation heatmap",
            ChartKind::Line => "Line chart",
        }
    }

    /// Number of column pickers the chart needs.
    pub fn axes(&self) -> usize {
        match self {
            ChartKind::Bar | ChartKind::Histogram | ChartKind::Line => 1,
            ChartKind::Scatter => 2,
            ChartKind::CorrelationHeatmap => 0,
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    pub kind: ChartKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    pub kind: ChartKind,
    pub title: String,
    pub svg: String,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
    pub heatmap_height: u32,
    pub histogram_bins: usize,
    /// Font family used for chart text in the PNG export. When unset the
    /// first installed family from a short list of common sans fonts is used.
    pub font_family: Option<String>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            heatmap_height: 800,
            histogram_bins: 30,
            font_family: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u32,
}

/// Draws charts as SVG and rasterizes them to PNG.
pub struct ChartRenderer {
    settings: ChartSettings,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for ChartRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartRenderer")
            .field("settings", &self.settings)
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl ChartRenderer {
    pub fn new(settings: ChartSettings) -> Self {
        let fontdb = load_fonts(settings.font_family.as_deref());
        Self {
            settings,
            fontdb: Arc::new(fontdb),
        }
    }

    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    pub fn render(
        &self,
        dataset: &Dataset,
        request: &ChartRequest,
    ) -> Result<RenderedChart, ExplorerError> {
        let size = (self.settings.width, self.settings.height);
        let (title, svg) = match request.kind {
            ChartKind::Bar => {
                let column = require_axis(&request.x, "X")?;
                let counts = value_counts(&dataset.display_values(column)?);
                let title = format!("{} ({})", ChartKind::Bar.label(), column);
                let svg = draw_svg(size, |root| draw_bar(root, &title, column, &counts))?;
                (title, svg)
            }
            ChartKind::Histogram => {
                let column = require_axis(&request.x, "X")?;
                let values: Vec<f64> = dataset.numeric_values(column)?.into_iter().flatten().collect();
                let bins = histogram_bins(&values, self.settings.histogram_bins);
                let title = format!("{} ({})", ChartKind::Histogram.label(), column);
                let svg = draw_svg(size, |root| draw_histogram(root, &title, column, &bins))?;
                (title, svg)
            }
            ChartKind::Line => {
                let column = require_axis(&request.x, "X")?;
                let values = dataset.numeric_values(column)?;
                let title = format!("{} ({})", ChartKind::Line.label(), column);
                let svg = draw_svg(size, |root| draw_line(root, &title, column, &values))?;
                (title, svg)
            }
            ChartKind::Scatter => {
                let x = require_axis(&request.x, "X")?;
                let y = require_axis(&request.y, "Y")?;
                let points: Vec<(f64, f64)> = dataset
                    .numeric_values(x)?
                    .into_iter()
                    .zip(dataset.numeric_values(y)?)
                    .filter_map(|(a, b)| Some((a?, b?)))
                    .collect();
                let title = format!("{} vs {} scatter plot", x, y);
                let svg = draw_svg(size, |root| draw_scatter(root, &title, (x, y), &points))?;
                (title, svg)
            }
            ChartKind::CorrelationHeatmap => {
                let matrix = CorrelationMatrix::compute(dataset)?;
                if matrix.columns.is_empty() {
                    return Err(ExplorerError::EmptySelection {
                        message: "The correlation heatmap needs at least one numeric column."
                            .to_string(),
                    });
                }
                let title = ChartKind::CorrelationHeatmap.label().to_string();
                let heatmap_size = (self.settings.width, self.settings.heatmap_height);
                let svg = draw_svg(heatmap_size, |root| draw_heatmap(root, &title, &matrix))?;
                (title, svg)
            }
        };

        let png = self.rasterize(&svg)?;
        info!(
            "Rendered {} ({} bytes SVG, {} bytes PNG)",
            title,
            svg.len(),
            png.len()
        );

        Ok(RenderedChart {
            kind: request.kind,
            title,
            svg,
            png,
        })
    }

    pub fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ExplorerError> {
        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(svg, &options).map_err(chart_error)?;
        let size = tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            ExplorerError::Chart {
                message: format!("invalid image size {}x{}", size.width(), size.height()),
            }
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
        pixmap.encode_png().map_err(chart_error)
    }
}

/// Counts distinct values, most frequent first; ties keep first-seen order.
pub fn value_counts(values: &[Option<String>]) -> Vec<(String, u32)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, u32)> = Vec::new();
    for value in values.iter().flatten() {
        match index.get(value.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value.as_str(), counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Equal-width bins over [min, max]; the last bin includes `max`. A constant
/// series is spread over [v - 0.5, v + 0.5].
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let bins = bins.max(1);
    let Some((min, max)) = min_max(values.iter().copied()) else {
        return Vec::new();
    };
    let (low, high) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (high - low) / bins as f64;

    let mut counts = vec![0u32; bins];
    for value in values {
        let slot = (((value - low) / width).floor() as usize).min(bins - 1);
        counts[slot] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: low + width * i as f64,
            end: low + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Diverging blue-white-red color for a coefficient in [-1, 1].
pub fn diverging_color(value: Option<f64>) -> RGBColor {
    let Some(value) = value else {
        return NAN_COLOR;
    };
    let t = value.clamp(-1.0, 1.0);
    let (from, to, amount) = if t < 0.0 {
        (NEUTRAL, COOL, -t)
    } else {
        (NEUTRAL, WARM, t)
    };
    let mix = |a: f64, b: f64| (a + (b - a) * amount).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

fn require_axis<'a>(axis: &'a Option<String>, label: &str) -> Result<&'a str, ExplorerError> {
    axis.as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ExplorerError::EmptySelection {
            message: format!("Select a column for the {} axis.", label),
        })
}

fn chart_error(err: impl std::fmt::Display) -> ExplorerError {
    ExplorerError::Chart {
        message: err.to_string(),
    }
}

fn load_fonts(preferred: Option<&str>) -> usvg::fontdb::Database {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let family = preferred.map(str::to_string).or_else(|| {
        let installed: Vec<&str> = db
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.as_str()))
            .collect();
        PREFERRED_FAMILIES
            .iter()
            .find(|family| installed.contains(family))
            .or(installed.first())
            .map(|family| family.to_string())
    });

    match family {
        Some(family) => {
            debug!("Using '{}' for chart text ({} faces loaded)", family, db.len());
            db.set_sans_serif_family(family);
        }
        None => warn!("No system fonts found; exported chart images will have no text"),
    }
    db
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn padded(range: Option<(f64, f64)>) -> Range<f64> {
    match range {
        None => 0.0..1.0,
        Some((lo, hi)) if lo == hi => (lo - 0.5)..(hi + 0.5),
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad)..(hi + pad)
        }
    }
}

fn draw_svg<F>(size: (u32, u32), draw: F) -> Result<String, ExplorerError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), ExplorerError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        draw(&root)?;
        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

fn draw_bar(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    column: &str,
    counts: &[(String, u32)],
) -> Result<(), ExplorerError> {
    let top = counts.iter().map(|(_, c)| *c).max().unwrap_or(0) + 1;
    let names: Vec<&str> = counts.iter().map(|(name, _)| name.as_str()).collect();
    let (x_range, x_ticks) = category_axis(counts.len());

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.with_key_points(x_ticks), 0u32..top)
        .map_err(chart_error)?;

    let label = |tick: &u32| category_label(&names, *tick).unwrap_or_default().to_string();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&label)
        .x_desc(column)
        .y_desc("count")
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, (_, count))| {
            let (left, right) = category_span(i);
            let mut bar = Rectangle::new([(left, 0), (right, *count)], BAR_COLOR.filled());
            bar.set_margin(0, 0, 8, 8);
            bar
        }))
        .map_err(chart_error)?;
    Ok(())
}

fn draw_histogram(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    column: &str,
    bins: &[HistogramBin],
) -> Result<(), ExplorerError> {
    let x_range = match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => first.start..last.end,
        _ => 0.0..1.0,
    };
    let top = bins.iter().map(|b| b.count).max().unwrap_or(0) + 1;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0u32..top)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(column)
        .y_desc("frequency")
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(bins.iter().map(|bin| {
            Rectangle::new([(bin.start, 0u32), (bin.end, bin.count)], BAR_COLOR.filled())
        }))
        .map_err(chart_error)?;
    chart
        .draw_series(bins.iter().map(|bin| {
            Rectangle::new([(bin.start, 0u32), (bin.end, bin.count)], WHITE.stroke_width(1))
        }))
        .map_err(chart_error)?;
    Ok(())
}

fn draw_line(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    column: &str,
    values: &[Option<f64>],
) -> Result<(), ExplorerError> {
    let x_end = values.len().saturating_sub(1).max(1) as f64;
    let y_range = padded(min_max(values.iter().flatten().copied()));

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_end, y_range)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .x_desc("row")
        .y_desc(column)
        .draw()
        .map_err(chart_error)?;

    // Missing values split the series into separate runs.
    let mut runs: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    for (row, value) in values.iter().enumerate() {
        match value {
            Some(v) => {
                if let Some(run) = runs.last_mut() {
                    run.push((row as f64, *v));
                }
            }
            None => runs.push(Vec::new()),
        }
    }
    for run in runs.into_iter().filter(|run| !run.is_empty()) {
        chart
            .draw_series(LineSeries::new(run, BAR_COLOR.stroke_width(2)))
            .map_err(chart_error)?;
    }
    Ok(())
}

fn draw_scatter(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    (x, y): (&str, &str),
    points: &[(f64, f64)],
) -> Result<(), ExplorerError> {
    let x_range = padded(min_max(points.iter().map(|p| p.0)));
    let y_range = padded(min_max(points.iter().map(|p| p.1)));

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .x_desc(x)
        .y_desc(y)
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, 4, BAR_COLOR.mix(0.7).filled())),
        )
        .map_err(chart_error)?;
    Ok(())
}

fn draw_heatmap(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    matrix: &CorrelationMatrix,
) -> Result<(), ExplorerError> {
    let n = matrix.columns.len();
    let (width, _) = root.dim_in_pixel();
    let (plot_area, legend_area) = root.split_horizontally(width.saturating_sub(120));
    let (x_range, x_ticks) = category_axis(n);
    let (y_range, y_ticks) = category_axis(n);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(120)
        .build_cartesian_2d(
            x_range.with_key_points(x_ticks),
            y_range.with_key_points(y_ticks),
        )
        .map_err(chart_error)?;

    // Row 0 is drawn at the top, so the y axis lists the columns in reverse.
    let names: Vec<&str> = matrix.columns.iter().map(String::as_str).collect();
    let reversed: Vec<&str> = names.iter().rev().copied().collect();
    let x_label = |tick: &u32| category_label(&names, *tick).unwrap_or_default().to_string();
    let y_label = |tick: &u32| category_label(&reversed, *tick).unwrap_or_default().to_string();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()
        .map_err(chart_error)?;

    let cells: Vec<(usize, usize, Option<f64>)> = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| (row, col, matrix.get(row, col)))
        .collect();

    chart
        .draw_series(cells.iter().map(|&(row, col, value)| {
            let (left, right) = category_span(col);
            let (bottom, top) = category_span(n - 1 - row);
            Rectangle::new([(left, bottom), (right, top)], diverging_color(value).filled())
        }))
        .map_err(chart_error)?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    chart
        .draw_series(cells.iter().map(|&(row, col, value)| {
            let (text, color): (String, &'static RGBColor) = match value {
                Some(v) if v.abs() > 0.6 => (format!("{:.2}", v), &WHITE),
                Some(v) => (format!("{:.2}", v), &BLACK),
                None => ("nan".to_string(), &BLACK),
            };
            Text::new(
                text,
                (category_center(col), category_center(n - 1 - row)),
                TextStyle::from((FONT, 14).into_font()).pos(centered).color(color),
            )
        }))
        .map_err(chart_error)?;

    draw_color_scale(&legend_area)
}

// Category axes run in half-slot units: slot `i` covers [2i, 2i + 2] and its
// tick sits at 2i + 1, so every slot has a whole-number center.
fn category_axis(count: usize) -> (Range<u32>, Vec<u32>) {
    let slots = count.max(1) as u32;
    (0..2 * slots, (0..count as u32).map(|i| 2 * i + 1).collect())
}

fn category_span(index: usize) -> (u32, u32) {
    let left = 2 * index as u32;
    (left, left + 2)
}

fn category_center(index: usize) -> u32 {
    2 * index as u32 + 1
}

fn category_label<'a>(names: &[&'a str], tick: u32) -> Option<&'a str> {
    names.get((tick / 2) as usize).copied()
}

/// Vertical color bar from +1 at the top to -1 at the bottom.
fn draw_color_scale(area: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), ExplorerError> {
    let (_, height) = area.dim_in_pixel();
    let top = 60i32;
    let bottom = height as i32 - 80;
    let steps = 100;
    let step_height = (bottom - top) as f64 / steps as f64;

    for step in 0..steps {
        let value = 1.0 - 2.0 * (step as f64 + 0.5) / steps as f64;
        let y0 = top + (step as f64 * step_height).floor() as i32;
        let y1 = top + ((step + 1) as f64 * step_height).ceil() as i32;
        area.draw(&Rectangle::new(
            [(20, y0), (50, y1)],
            diverging_color(Some(value)).filled(),
        ))
        .map_err(chart_error)?;
    }

    let label_style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for (value, y) in [(1.0, top), (0.0, (top + bottom) / 2), (-1.0, bottom)] {
        area.draw(&Text::new(format!("{:.1}", value), (58, y), label_style.clone()))
            .map_err(chart_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CsvOptions;

    fn strings(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn value_counts_sort_by_frequency_then_first_seen() {
        let counts = value_counts(&strings(&["b", "a", "", "a", "c", "b", "a"]));
        assert_eq!(
            counts,
            vec![
                ("a".to_string(), 3),
                ("b".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }

    #[test]
    fn histogram_uses_requested_bins_and_counts_everything() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let bins = histogram_bins(&values, 30);
        assert_eq!(bins.len(), 30);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 100);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[29].end, 99.0);
    }

    #[test]
    fn constant_histogram_is_centered() {
        let bins = histogram_bins(&[2.0, 2.0], 30);
        assert_eq!(bins[0].start, 1.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 2);
        assert!(histogram_bins(&[], 30).is_empty());
    }

    #[test]
    fn diverging_scale_is_centered_on_zero() {
        assert_eq!(diverging_color(Some(0.0)), RGBColor(221, 221, 221));
        assert_eq!(diverging_color(Some(1.0)), RGBColor(180, 4, 38));
        assert_eq!(diverging_color(Some(-1.0)), RGBColor(59, 76, 192));
        assert_eq!(diverging_color(None), NAN_COLOR);
    }

    /// `(x, y, width, height)` of every filled rectangle with the given color.
    fn filled_rects(svg: &str, color: &str) -> Vec<(i32, i32, i32, i32)> {
        let pattern = regex::Regex::new(&format!(
            r#"<rect x="(-?\d+)" y="(-?\d+)" width="(-?\d+)" height="(-?\d+)" opacity="[^"]*" fill="{}""#,
            color
        ))
        .unwrap();
        pattern
            .captures_iter(svg)
            .map(|c| {
                let n = |i: usize| c[i].parse::<i32>().unwrap();
                (n(1), n(2), n(3), n(4))
            })
            .collect()
    }

    fn render(csv: &str, request: ChartRequest) -> RenderedChart {
        let dataset = Dataset::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap();
        ChartRenderer::new(ChartSettings::default())
            .render(&dataset, &request)
            .unwrap()
    }

    #[test]
    fn bar_chart_has_one_slot_per_category() {
        let chart = render(
            "v\nx\ny\nx\nz\n",
            ChartRequest {
                kind: ChartKind::Bar,
                x: Some("v".to_string()),
                y: None,
            },
        );

        let bars = filled_rects(&chart.svg, "#1F77B4");
        assert_eq!(bars.len(), 3);

        // Plot area spans x in [80, 980]; the last bar ends one margin short of it.
        let right_edge = bars.iter().map(|(x, _, w, _)| x + w).max().unwrap();
        assert!(right_edge >= 960, "last bar ends at {}", right_edge);
        let widths: Vec<i32> = bars.iter().map(|b| b.2).collect();
        assert!(widths.iter().all(|w| (w - widths[0]).abs() <= 2));
    }

    #[test]
    fn heatmap_cells_fill_the_plot_area() {
        let chart = render(
            "a,b\n1,2\n2,4\n3,6\n",
            ChartRequest {
                kind: ChartKind::CorrelationHeatmap,
                x: None,
                y: None,
            },
        );

        // Perfectly correlated columns give four cells at +1.
        let cells = filled_rects(&chart.svg, "#B40426");
        assert_eq!(cells.len(), 4);

        // The plot area spans x in [140, 860] next to the 120px legend.
        let left = cells.iter().map(|c| c.0).min().unwrap();
        let right = cells.iter().map(|(x, _, w, _)| x + w).max().unwrap();
        assert!((left - 140).abs() <= 4, "cells start at {}", left);
        assert!((right - 860).abs() <= 4, "cells end at {}", right);
        for (_, _, w, h) in &cells {
            assert!((w - 360).abs() <= 4, "cell width {}", w);
            assert!(*h > 0);
        }

        let tops: std::collections::BTreeSet<i32> = cells.iter().map(|c| c.1).collect();
        assert_eq!(tops.len(), 2);
    }

    #[test]
    fn category_ticks_sit_at_slot_centers() {
        let (range, ticks) = category_axis(3);
        assert_eq!(range, 0..6);
        assert_eq!(ticks, vec![1, 3, 5]);
        assert_eq!(category_span(2), (4, 6));
        assert_eq!(category_label(&["a", "b", "c"], 5), Some("c"));
        assert_eq!(category_axis(0), (0..2, vec![]));
    }

    #[test]
    fn chart_kinds_round_trip_through_json() {
        let request: ChartRequest =
            serde_json::from_str(r#"{"kind":"correlation_heatmap"}"#).unwrap();
        assert_eq!(request.kind, ChartKind::CorrelationHeatmap);
        assert_eq!(request.x, None);
        assert_eq!(ChartKind::Scatter.axes(), 2);
    }
}
