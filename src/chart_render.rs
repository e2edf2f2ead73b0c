use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt::Display;
use std::ops::Range;

use crate::config::ChartConfig;
use crate::error::{Error, Result};

pub(crate) const PRIMARY: RGBColor = RGBColor(0x3b, 0x82, 0xf6);
pub(crate) const SUCCESS: RGBColor = RGBColor(0x10, 0xb9, 0x81);
pub(crate) const WARNING: RGBColor = RGBColor(0xf5, 0x9e, 0x0b);
pub(crate) const DANGER: RGBColor = RGBColor(0xef, 0x44, 0x44);
pub(crate) const INFO: RGBColor = RGBColor(0x06, 0xb6, 0xd4);
pub(crate) const PURPLE: RGBColor = RGBColor(0x8b, 0x5c, 0xf6);

pub(crate) const CATEGORY_PALETTE: [RGBColor; 6] = [PRIMARY, SUCCESS, WARNING, DANGER, INFO, PURPLE];

const GRID: RGBColor = RGBColor(0xe5, 0xe7, 0xeb);
const AXIS: RGBColor = RGBColor(0x9c, 0xa3, 0xaf);
const GRID_LINES: usize = 5;
const PANEL_MARGIN: u32 = 20;

pub(crate) type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Histogram,
    Bar,
    Line,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartArtifact {
    pub title: String,
    pub data: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bar {
    pub start: f64,
    pub end: f64,
    pub value: f64,
    pub color: RGBColor,
}

impl Bar {
    pub fn in_slot(slot: usize, width: f64, offset: f64, value: f64, color: RGBColor) -> Self {
        let centre = slot as f64 + 0.5 + offset;
        Bar {
            start: centre - width / 2.0,
            end: centre + width / 2.0,
            value,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineSeries {
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub width: u32,
    pub markers: bool,
    pub fill: bool,
}

pub(crate) fn chart_error<E: Display>(err: E) -> Error {
    Error::Chart(err.to_string())
}

pub(crate) fn render_png<F>(config: &ChartConfig, draw: F) -> Result<String>
where
    F: FnOnce(&Panel<'_>) -> Result<()>,
{
    let (width, height) = (config.width, config.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        draw(&root)?;
        root.present().map_err(chart_error)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&buffer, width, height, ColorType::Rgb8)
        .map_err(chart_error)?;
    Ok(STANDARD.encode(png))
}

pub(crate) fn render_artifact<F>(
    title: &str,
    kind: ChartKind,
    config: &ChartConfig,
    draw: F,
) -> Result<ChartArtifact>
where
    F: FnOnce(&Panel<'_>) -> Result<()>,
{
    Ok(ChartArtifact {
        title: title.to_string(),
        data: render_png(config, draw)?,
        kind,
    })
}

pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>, with_zero: bool) -> Range<f64> {
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for value in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(value);
        max = max.max(value);
    }
    if with_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        return (min - 0.5)..(max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

fn value_gridlines(
    categories: &Range<f64>,
    values: &Range<f64>,
    orientation: Orientation,
) -> Vec<PathElement<(f64, f64)>> {
    let step = (values.end - values.start) / GRID_LINES as f64;
    (0..=GRID_LINES)
        .map(|i| {
            let v = values.start + step * i as f64;
            let points = match orientation {
                Orientation::Vertical => vec![(categories.start, v), (categories.end, v)],
                Orientation::Horizontal => vec![(v, categories.start), (v, categories.end)],
            };
            PathElement::new(points, GRID.stroke_width(1))
        })
        .collect()
}

pub(crate) fn draw_bar_panel(
    area: &Panel<'_>,
    bars: &[Bar],
    slots: usize,
    orientation: Orientation,
) -> Result<()> {
    let categories = 0.0..(slots.max(1) as f64);
    let values = padded_range(bars.iter().map(|bar| bar.value), true);
    let (x, y) = match orientation {
        Orientation::Vertical => (categories.clone(), values.clone()),
        Orientation::Horizontal => (values.clone(), categories.clone()),
    };
    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .build_cartesian_2d(x, y)
        .map_err(chart_error)?;

    chart
        .draw_series(value_gridlines(&categories, &values, orientation))
        .map_err(chart_error)?;
    chart
        .draw_series(bars.iter().map(|bar| {
            let corners = match orientation {
                Orientation::Vertical => [(bar.start, 0.0), (bar.end, bar.value)],
                Orientation::Horizontal => [(0.0, bar.start), (bar.value, bar.end)],
            };
            Rectangle::new(corners, bar.color.mix(0.85).filled())
        }))
        .map_err(chart_error)?;
    let zero = match orientation {
        Orientation::Vertical => vec![(categories.start, 0.0), (categories.end, 0.0)],
        Orientation::Horizontal => vec![(0.0, categories.start), (0.0, categories.end)],
    };
    chart
        .draw_series(std::iter::once(PathElement::new(zero, AXIS.stroke_width(1))))
        .map_err(chart_error)?;
    Ok(())
}

pub(crate) fn draw_line_panel(area: &Panel<'_>, series: &[LineSeries]) -> Result<()> {
    let all_points = || series.iter().flat_map(|s| s.points.iter().copied());
    let x = padded_range(all_points().map(|(x, _)| x), false);
    let fills = series.iter().any(|s| s.fill);
    let y = padded_range(all_points().map(|(_, y)| y), fills);
    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .build_cartesian_2d(x.clone(), y.clone())
        .map_err(chart_error)?;

    chart
        .draw_series(value_gridlines(&x, &y, Orientation::Vertical))
        .map_err(chart_error)?;
    for line in series {
        if line.fill && line.points.len() > 1 {
            let mut outline = line.points.clone();
            if let (Some(&(first_x, _)), Some(&(last_x, _))) = (line.points.first(), line.points.last()) {
                outline.push((last_x, 0.0));
                outline.push((first_x, 0.0));
            }
            chart
                .draw_series(std::iter::once(Polygon::new(outline, line.color.mix(0.25).filled())))
                .map_err(chart_error)?;
        }
        chart
            .draw_series(std::iter::once(PathElement::new(
                line.points.clone(),
                line.color.stroke_width(line.width),
            )))
            .map_err(chart_error)?;
        if line.markers {
            chart
                .draw_series(
                    line.points
                        .iter()
                        .map(|&point| Circle::new(point, 4, line.color.filled())),
                )
                .map_err(chart_error)?;
        }
    }
    Ok(())
}

pub(crate) fn draw_pie_panel(area: &Panel<'_>, values: &[f64]) -> Result<()> {
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return Ok(());
    }
    let (width, height) = area.dim_in_pixel();
    let centre = (width as f64 / 2.0, height as f64 / 2.0);
    let radius = (width.min(height) as f64 / 2.0 - PANEL_MARGIN as f64).max(1.0);

    let mut angle = -PI / 2.0;
    for (idx, value) in values.iter().filter(|v| **v > 0.0).enumerate() {
        let sweep = value / total * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 120.0).ceil().max(2.0) as usize;
        let mut outline = vec![(centre.0 as i32, centre.1 as i32)];
        for step in 0..=steps {
            let a = angle + sweep * step as f64 / steps as f64;
            outline.push((
                (centre.0 + radius * a.cos()).round() as i32,
                (centre.1 + radius * a.sin()).round() as i32,
            ));
        }
        let color = CATEGORY_PALETTE[idx % CATEGORY_PALETTE.len()];
        area.draw(&Polygon::new(outline, color.filled()))
            .map_err(chart_error)?;
        angle += sweep;
    }
    Ok(())
}

pub fn render_placeholder(message: &str, config: &ChartConfig) -> Result<ChartArtifact> {
    render_artifact(message, ChartKind::Empty, config, |root| {
        let (width, height) = root.dim_in_pixel();
        let inset = PANEL_MARGIN as i32;
        let frame = [
            (inset, inset),
            (width as i32 - inset, height as i32 - inset),
        ];
        root.draw(&Rectangle::new(frame, RGBColor(0xf3, 0xf4, 0xf6).filled()))
            .map_err(chart_error)?;
        root.draw(&Rectangle::new(frame, AXIS.stroke_width(1)))
            .map_err(chart_error)?;
        Ok(())
    })
}

#[cfg(test)]
pub(crate) fn decode_png(artifact: &ChartArtifact) -> image::DynamicImage {
    let bytes = STANDARD.decode(&artifact.data).expect("base64 chart");
    image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).expect("png chart")
}
