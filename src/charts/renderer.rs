//! Static Chart Renderer
//! Rasterises any chart figure to PNG with plotters, for export and the live preview.
//!
//! Figures are drawn by family:
//! 1. Cartesian: lines, markers, stacked areas, bars, histograms, boxes,
//!    funnels, correlation heatmaps and density grids
//! 2. Proportional: pie, sunburst ring and treemap tiles
//! 3. Polar: polar and radar traces on a spoke grid
//! 4. 3-D: projected scatter and line traces

use crate::charts::figure::{Figure, Scalar, Trace, TraceType, ZValues};
use crate::stats::{bounds, BoxSummary, StatsCalculator};
use anyhow::Result as DrawResult;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_backend::{BackendColor, BackendCoord, BackendTextStyle, DrawingErrorKind};
use std::f64::consts::{PI, TAU};
use std::io::Cursor;
use std::panic;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid image size {0}x{1}")]
    InvalidSize(u32, u32),
    #[error("Figure has no traces")]
    EmptyFigure,
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(255, 87, 34),   // Deep Orange
    RGBColor(121, 85, 72),   // Brown
];

const GRID_GRAY: RGBColor = RGBColor(200, 200, 200);
const MISSING_GRAY: RGBColor = RGBColor(230, 230, 230);

// Viridis anchors at 0, .25, .5, .75, 1
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

const DENSITY_GRID: usize = 24;
const SINE_POINTS: usize = 100;

pub fn palette(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// Linear interpolation through the viridis anchors, `t` clamped to [0, 1].
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let lo = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lo as f64;
    let (a, b) = (VIRIDIS[lo], VIRIDIS[lo + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render a figure to PNG bytes.
    pub fn render_png(figure: &Figure, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize(width, height));
        }
        if figure.is_empty() {
            return Err(RenderError::EmptyFigure);
        }

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
            let root = TextSafeBackend::new(backend).into_drawing_area();
            Self::draw_figure(&root, figure).map_err(|e| RenderError::Drawing(format!("{:#}", e)))?;
            root.present()
                .map_err(|e| RenderError::Drawing(e.to_string()))?;
        }

        Self::encode_png(buffer, width, height)
    }

    fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        let img = RgbImage::from_raw(width, height, buffer)
            .ok_or(RenderError::InvalidSize(width, height))?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// `data:image/png;base64,...` URI for embedding in an `<img>`.
    pub fn to_data_uri(png: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    /// The fixed demo curve: sin(x) sampled at 100 points on [0, 10].
    pub fn sine_wave_figure() -> Figure {
        let xs: Vec<f64> = (0..SINE_POINTS)
            .map(|i| 10.0 * i as f64 / (SINE_POINTS - 1) as f64)
            .collect();
        let trace = Trace::new(TraceType::Scatter)
            .mode("lines")
            .x(xs.iter().map(|&x| Scalar::Number(x)).collect())
            .y(xs.iter().map(|&x| Scalar::Number(x.sin())).collect());
        Figure {
            data: vec![trace],
            layout: crate::charts::figure::Layout {
                title: Some("Live Line Plot".into()),
                ..Default::default()
            },
        }
    }

    pub fn sine_wave_png(width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        Self::render_png(&Self::sine_wave_figure(), width, height)
    }

    fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let title = figure.title_text().unwrap_or("");
        let family = figure.data[0].trace_type;
        debug!(?family, traces = figure.data.len(), "rendering figure");

        match family {
            TraceType::Pie | TraceType::Sunburst | TraceType::Treemap => {
                Self::draw_proportional(root, title, &figure.data[0])
            }
            TraceType::Scatterpolar => Self::draw_polar(root, title, &figure.data),
            TraceType::Scatter3d => Self::draw_3d(root, title, &figure.data),
            _ => {
                let plan = CartesianPlan::from_traces(&figure.data);
                Self::draw_cartesian(root, title, figure, &plan)
            }
        }
    }

    fn draw_cartesian<DB>(
        root: &DrawingArea<DB, Shift>,
        title: &str,
        figure: &Figure,
        plan: &CartesianPlan,
    ) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let ((x0, x1), (y0, y1)) = plan.ranges();
        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let x_fmt = |v: &f64| axis_label(plan.x_labels.as_deref(), *v);
        let y_fmt = |v: &f64| axis_label(plan.y_labels.as_deref(), *v);
        let x_desc = axis_title(figure, true);
        let y_desc = axis_title(figure, false);

        let mut mesh = chart.configure_mesh();
        mesh.x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .light_line_style(&WHITE)
            .x_desc(x_desc.as_str())
            .y_desc(y_desc.as_str());
        if let Some(labels) = &plan.x_labels {
            mesh.x_labels(labels.len() * 2 + 1);
        }
        if let Some(labels) = &plan.y_labels {
            mesh.y_labels(labels.len() * 2 + 1);
        }
        mesh.draw()?;

        for mark in &plan.marks {
            match mark {
                Mark::Line { points, color, legend } => {
                    let anno = chart.draw_series(LineSeries::new(
                        points.iter().copied(),
                        color.stroke_width(2),
                    ))?;
                    if let Some(name) = legend {
                        let c = *color;
                        anno.label(name.as_str()).legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(2))
                        });
                    }
                }
                Mark::Markers { points, color, legend } => {
                    let c = *color;
                    let anno = chart.draw_series(
                        points
                            .iter()
                            .map(move |&(x, y, r)| Circle::new((x, y), r, c.mix(0.8).filled())),
                    )?;
                    if let Some(name) = legend {
                        anno.label(name.as_str())
                            .legend(move |(x, y)| Circle::new((x + 10, y), 4, c.filled()));
                    }
                }
                Mark::Band { upper, lower, color } => {
                    let mut outline = upper.clone();
                    outline.extend(lower.iter().rev().copied());
                    chart.draw_series(std::iter::once(Polygon::new(
                        outline,
                        color.mix(0.35).filled(),
                    )))?;
                }
                Mark::Rect { x0, y0, x1, y1, color, legend } => {
                    let c = *color;
                    let anno = chart.draw_series(std::iter::once(Rectangle::new(
                        [(*x0, *y0), (*x1, *y1)],
                        c.mix(0.85).filled(),
                    )))?;
                    if let Some(name) = legend {
                        anno.label(name.as_str()).legend(move |(x, y)| {
                            Rectangle::new([(x, y - 5), (x + 16, y + 5)], c.filled())
                        });
                    }
                }
                Mark::BoxGlyph { x, half_width, summary, color } => {
                    Self::draw_box_glyph(&mut chart, *x, *half_width, summary, *color)?;
                }
                Mark::Cell { x0, y0, x1, y1, color } => {
                    chart.draw_series(std::iter::once(Rectangle::new(
                        [(*x0, *y0), (*x1, *y1)],
                        color.filled(),
                    )))?;
                }
                Mark::Label { x, y, text, light } => {
                    let color = if *light { WHITE } else { BLACK };
                    let style = TextStyle::from(("sans-serif", 14).into_font())
                        .color(&color)
                        .pos(Pos::new(HPos::Center, VPos::Center));
                    chart.draw_series(std::iter::once(Text::new(text.clone(), (*x, *y), style)))?;
                }
            }
        }

        if plan.has_legend() {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK.mix(0.3))
                .draw()?;
        }
        Ok(())
    }

    fn draw_box_glyph<DB>(
        chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
        x: f64,
        half: f64,
        s: &BoxSummary,
        color: RGBColor,
    ) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let stroke = color.stroke_width(2);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, s.q1), (x + half, s.q3)],
            color.mix(0.3).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, s.q1), (x + half, s.q3)],
            stroke,
        )))?;
        let segments = [
            vec![(x - half, s.median), (x + half, s.median)],
            vec![(x, s.q3), (x, s.whisker_high)],
            vec![(x, s.q1), (x, s.whisker_low)],
            vec![(x - half / 2.0, s.whisker_high), (x + half / 2.0, s.whisker_high)],
            vec![(x - half / 2.0, s.whisker_low), (x + half / 2.0, s.whisker_low)],
        ];
        chart.draw_series(segments.into_iter().map(|seg| PathElement::new(seg, stroke)))?;
        Ok(())
    }

    /// Pie wedges, a sunburst ring, or treemap tiles for a flat hierarchy.
    fn draw_proportional<DB>(root: &DrawingArea<DB, Shift>, title: &str, trace: &Trace) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = root.titled(title, ("sans-serif", 24))?;
        let labels = trace.labels.clone().unwrap_or_default();
        let slices: Vec<(usize, f64)> = trace
            .values
            .iter()
            .flatten()
            .enumerate()
            .filter_map(|(i, v)| v.as_f64().filter(|v| *v > 0.0).map(|v| (i, v)))
            .collect();
        let total: f64 = slices.iter().map(|(_, v)| v).sum();
        let (w, h) = area.dim_in_pixel();
        let label_style = TextStyle::from(("sans-serif", 16).into_font())
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));

        if trace.trace_type == TraceType::Treemap {
            let mut tiles = Vec::new();
            partition(&slices, (10.0, 10.0, w as f64 - 10.0, h as f64 - 10.0), &mut tiles);
            for (order, (idx, (x0, y0, x1, y1))) in tiles.into_iter().enumerate() {
                let (x0, y0, x1, y1) = (x0 as i32, y0 as i32, x1 as i32, y1 as i32);
                area.draw(&Rectangle::new([(x0, y0), (x1, y1)], palette(order).filled()))?;
                area.draw(&Rectangle::new([(x0, y0), (x1, y1)], WHITE.stroke_width(2)))?;
                if let Some(label) = labels.get(idx) {
                    area.draw(&Text::new(
                        label.clone(),
                        ((x0 + x1) / 2, (y0 + y1) / 2),
                        label_style.clone(),
                    ))?;
                }
            }
            return Ok(());
        }

        let center = (w as f64 / 2.0, h as f64 / 2.0);
        let outer = (w.min(h) as f64 / 2.0 - 30.0).max(10.0);
        let inner = if trace.trace_type == TraceType::Sunburst {
            outer * 0.35
        } else {
            0.0
        };

        if total <= 0.0 {
            area.draw(&Circle::new(
                (center.0 as i32, center.1 as i32),
                outer as u32,
                GRID_GRAY.stroke_width(1),
            ))?;
            return Ok(());
        }

        let mut start = 0.0;
        for (order, (idx, value)) in slices.iter().enumerate() {
            let sweep = TAU * value / total;
            let wedge = wedge_points(center, inner, outer, start, start + sweep);
            area.draw(&Polygon::new(wedge, palette(order).filled()))?;

            if let Some(label) = labels.get(*idx) {
                let mid = start + sweep / 2.0;
                let r = if inner > 0.0 { (inner + outer) / 2.0 } else { outer * 0.65 };
                area.draw(&Text::new(
                    label.clone(),
                    polar_to_px(center, r, mid),
                    label_style.clone(),
                ))?;
            }
            start += sweep;
        }
        Ok(())
    }

    fn draw_polar<DB>(root: &DrawingArea<DB, Shift>, title: &str, traces: &[Trace]) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = root.titled(title, ("sans-serif", 24))?;
        let (w, h) = area.dim_in_pixel();
        let center = (w as f64 / 2.0, h as f64 / 2.0);
        let radius = (w.min(h) as f64 / 2.0 - 40.0).max(10.0);

        let categories = unique_labels(traces.iter().filter_map(|t| t.theta.as_ref()).flatten());
        let spokes = categories.len().max(1);
        let (_, r_max) = bounds(
            traces
                .iter()
                .filter_map(|t| t.r.as_ref())
                .flatten()
                .filter_map(Scalar::as_f64),
        );
        let r_max = if r_max > 0.0 { r_max } else { 1.0 };

        for ring in 1..=4 {
            area.draw(&Circle::new(
                (center.0 as i32, center.1 as i32),
                (radius * ring as f64 / 4.0) as u32,
                GRID_GRAY.stroke_width(1),
            ))?;
        }
        let label_style = TextStyle::from(("sans-serif", 14).into_font())
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        for (k, label) in categories.iter().enumerate() {
            let angle = TAU * k as f64 / spokes as f64;
            area.draw(&PathElement::new(
                vec![polar_to_px(center, 0.0, angle), polar_to_px(center, radius, angle)],
                GRID_GRAY.stroke_width(1),
            ))?;
            area.draw(&Text::new(
                label.clone(),
                polar_to_px(center, radius + 18.0, angle),
                label_style.clone(),
            ))?;
        }

        for (idx, trace) in traces.iter().enumerate() {
            let color = palette(idx);
            let (Some(theta), Some(r)) = (&trace.theta, &trace.r) else {
                continue;
            };
            let points: Vec<(i32, i32)> = theta
                .iter()
                .zip(r.iter())
                .filter_map(|(t, r)| {
                    let k = categories.iter().position(|c| c == t)?;
                    let value = r.as_f64()?.max(0.0);
                    let angle = TAU * k as f64 / spokes as f64;
                    Some(polar_to_px(center, radius * value / r_max, angle))
                })
                .collect();
            if points.is_empty() {
                continue;
            }

            if trace.fill.is_some() {
                area.draw(&Polygon::new(points.clone(), color.mix(0.25).filled()))?;
            }
            area.draw(&PathElement::new(points.clone(), color.stroke_width(2)))?;
            if trace.mode.is_some_and(|m| m.contains("markers")) {
                for &p in &points {
                    area.draw(&Circle::new(p, 4, color.filled()))?;
                }
            }
        }
        Ok(())
    }

    fn draw_3d<DB>(root: &DrawingArea<DB, Shift>, title: &str, traces: &[Trace]) -> DrawResult<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let mut series: Vec<(Vec<(f64, f64, f64)>, bool)> = Vec::new();
        for trace in traces {
            let xs = trace.x.as_deref().unwrap_or_default();
            let ys = trace.y.as_deref().unwrap_or_default();
            let zs = match &trace.z {
                Some(ZValues::Series(z)) => z.as_slice(),
                _ => &[],
            };
            let (x_pos, _) = positions(xs);
            let points = x_pos
                .iter()
                .zip(ys.iter().zip(zs.iter()))
                .filter_map(|(x, (y, z))| Some(((*x)?, y.as_f64()?, z.as_f64()?)))
                .collect();
            let lines = trace.mode.is_some_and(|m| m.contains("lines"));
            series.push((points, lines));
        }

        let all = || series.iter().flat_map(|(pts, _)| pts.iter());
        let (x0, x1) = padded(bounds(all().map(|p| p.0)));
        let (y0, y1) = padded(bounds(all().map(|p| p.1)));
        let (z0, z1) = padded(bounds(all().map(|p| p.2)));

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24))
            .margin(20)
            .build_cartesian_3d(x0..x1, y0..y1, z0..z1)?;
        chart.with_projection(|mut pb| {
            pb.yaw = 0.6;
            pb.pitch = 0.35;
            pb.scale = 0.85;
            pb.into_matrix()
        });
        chart.configure_axes().draw()?;

        for (idx, (points, lines)) in series.iter().enumerate() {
            let color = palette(idx);
            if *lines {
                chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;
            } else {
                chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
            }
        }
        Ok(())
    }
}

/// Drawable primitive in data coordinates.
#[derive(Debug, Clone)]
enum Mark {
    Line {
        points: Vec<(f64, f64)>,
        color: RGBColor,
        legend: Option<String>,
    },
    Markers {
        points: Vec<(f64, f64, u32)>,
        color: RGBColor,
        legend: Option<String>,
    },
    Band {
        upper: Vec<(f64, f64)>,
        lower: Vec<(f64, f64)>,
        color: RGBColor,
    },
    Rect {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        color: RGBColor,
        legend: Option<String>,
    },
    BoxGlyph {
        x: f64,
        half_width: f64,
        summary: BoxSummary,
        color: RGBColor,
    },
    Cell {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        color: RGBColor,
    },
    Label {
        x: f64,
        y: f64,
        text: String,
        light: bool,
    },
}

impl Mark {
    fn extent(&self, out: &mut Vec<(f64, f64)>) {
        match self {
            Mark::Line { points, .. } => out.extend(points.iter().copied()),
            Mark::Markers { points, .. } => out.extend(points.iter().map(|&(x, y, _)| (x, y))),
            Mark::Band { upper, lower, .. } => {
                out.extend(upper.iter().copied());
                out.extend(lower.iter().copied());
            }
            Mark::Rect { x0, y0, x1, y1, .. } | Mark::Cell { x0, y0, x1, y1, .. } => {
                out.push((*x0, *y0));
                out.push((*x1, *y1));
            }
            Mark::BoxGlyph { x, half_width, summary, .. } => {
                out.push((x - half_width, summary.whisker_low));
                out.push((x + half_width, summary.whisker_high));
            }
            Mark::Label { .. } => {}
        }
    }
}

/// Cartesian marks plus categorical axis labels.
#[derive(Debug, Default)]
struct CartesianPlan {
    marks: Vec<Mark>,
    x_labels: Option<Vec<String>>,
    y_labels: Option<Vec<String>>,
}

impl CartesianPlan {
    fn from_traces(traces: &[Trace]) -> Self {
        let mut plan = CartesianPlan::default();
        let bar_count = traces
            .iter()
            .filter(|t| t.trace_type == TraceType::Bar)
            .count();
        let mut bar_slot = 0;
        let mut stack: Vec<f64> = Vec::new();

        let shared_x: Vec<&Scalar> = traces
            .iter()
            .filter(|t| matches!(t.trace_type, TraceType::Scatter | TraceType::Bar | TraceType::Histogram2dcontour))
            .filter_map(|t| t.x.as_ref())
            .flatten()
            .collect();
        let categories = if shared_x.iter().any(|s| matches!(s, Scalar::Text(_))) {
            Some(unique_labels(shared_x.iter().map(|s| s.label()).collect::<Vec<_>>().iter()))
        } else {
            None
        };
        let place = |s: &Scalar| -> Option<f64> {
            match &categories {
                Some(cats) => cats.iter().position(|c| *c == s.label()).map(|i| i as f64),
                None => s.as_f64(),
            }
        };

        for (idx, trace) in traces.iter().enumerate() {
            let color = palette(idx);
            let legend = trace.name.clone().filter(|_| traces.len() > 1);
            let xs = trace.x.as_deref().unwrap_or_default();
            let ys = trace.y.as_deref().unwrap_or_default();

            match trace.trace_type {
                TraceType::Scatter => {
                    let points: Vec<(f64, f64)> = xs
                        .iter()
                        .zip(ys.iter())
                        .filter_map(|(x, y)| Some((place(x)?, y.as_f64()?)))
                        .collect();
                    let mode = trace.mode.unwrap_or("markers");

                    if trace.stackgroup.is_some() {
                        if stack.len() < points.len() {
                            stack.resize(points.len(), 0.0);
                        }
                        let lower: Vec<(f64, f64)> =
                            points.iter().enumerate().map(|(i, &(x, _))| (x, stack[i])).collect();
                        let upper: Vec<(f64, f64)> = points
                            .iter()
                            .enumerate()
                            .map(|(i, &(x, y))| (x, stack[i] + y))
                            .collect();
                        for (i, &(_, y)) in upper.iter().enumerate() {
                            stack[i] = y;
                        }
                        plan.marks.push(Mark::Band {
                            upper: upper.clone(),
                            lower,
                            color,
                        });
                        plan.marks.push(Mark::Line {
                            points: upper,
                            color,
                            legend,
                        });
                        continue;
                    }

                    if mode.contains("lines") {
                        plan.marks.push(Mark::Line {
                            points: points.clone(),
                            color,
                            legend: legend.clone(),
                        });
                    }
                    if mode.contains("markers") {
                        let radii = marker_radii(trace, points.len());
                        plan.marks.push(Mark::Markers {
                            points: points
                                .iter()
                                .zip(radii)
                                .map(|(&(x, y), r)| (x, y, r))
                                .collect(),
                            color,
                            legend: if mode.contains("lines") { None } else { legend },
                        });
                    }
                }
                TraceType::Bar => {
                    let width = 0.8 / bar_count.max(1) as f64;
                    let offset = -0.4 + width * (bar_slot as f64 + 0.5);
                    bar_slot += 1;
                    let mut legend = legend;
                    for (x, y) in xs.iter().zip(ys.iter()) {
                        let (Some(x), Some(y)) = (place(x), y.as_f64()) else {
                            continue;
                        };
                        let cx = x + offset;
                        plan.marks.push(Mark::Rect {
                            x0: cx - width / 2.0,
                            y0: 0.0,
                            x1: cx + width / 2.0,
                            y1: y,
                            color,
                            legend: legend.take(),
                        });
                    }
                }
                TraceType::Histogram => {
                    let values: Vec<f64> = xs.iter().filter_map(Scalar::as_f64).collect();
                    if let Some(bins) = StatsCalculator::histogram(&values) {
                        for (i, &count) in bins.counts.iter().enumerate() {
                            let x0 = bins.start + bins.width * i as f64;
                            plan.marks.push(Mark::Rect {
                                x0,
                                y0: 0.0,
                                x1: x0 + bins.width,
                                y1: count as f64,
                                color,
                                legend: None,
                            });
                        }
                    }
                }
                TraceType::Box => {
                    let values: Vec<f64> = ys.iter().filter_map(Scalar::as_f64).collect();
                    if let Some(summary) = StatsCalculator::box_summary(&values) {
                        plan.marks.push(Mark::BoxGlyph {
                            x: idx as f64,
                            half_width: 0.3,
                            summary,
                            color,
                        });
                    }
                    plan.x_labels
                        .get_or_insert_with(Vec::new)
                        .push(trace.name.clone().unwrap_or_default());
                }
                TraceType::Funnel => {
                    let stages: Vec<String> = ys.iter().map(Scalar::label).collect();
                    let n = stages.len();
                    for (i, x) in xs.iter().enumerate().take(n) {
                        let Some(v) = x.as_f64() else { continue };
                        let y = (n - 1 - i) as f64;
                        plan.marks.push(Mark::Rect {
                            x0: -v.abs() / 2.0,
                            y0: y - 0.4,
                            x1: v.abs() / 2.0,
                            y1: y + 0.4,
                            color,
                            legend: None,
                        });
                    }
                    plan.y_labels = Some(stages.into_iter().rev().collect());
                }
                TraceType::Heatmap => plan.push_heatmap(trace),
                TraceType::Histogram2dcontour => {
                    let points: Vec<(f64, f64)> = xs
                        .iter()
                        .zip(ys.iter())
                        .filter_map(|(x, y)| Some((place(x)?, y.as_f64()?)))
                        .collect();
                    plan.push_density(&points);
                }
                TraceType::Pie
                | TraceType::Sunburst
                | TraceType::Treemap
                | TraceType::Scatterpolar
                | TraceType::Scatter3d => {}
            }
        }

        if plan.x_labels.is_none() {
            plan.x_labels = categories;
        }
        plan
    }

    fn push_heatmap(&mut self, trace: &Trace) {
        let Some(ZValues::Grid(grid)) = &trace.z else {
            return;
        };
        let names: Vec<String> = trace
            .x
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(Scalar::label)
            .collect();
        let n_rows = grid.len();
        let (lo, hi) = bounds(grid.iter().flatten().filter_map(Scalar::as_f64));
        let span = if hi > lo { hi - lo } else { 1.0 };

        for (i, row) in grid.iter().enumerate() {
            let y = (n_rows - 1 - i) as f64;
            for (j, cell) in row.iter().enumerate() {
                let x = j as f64;
                let (color, text, t) = match cell.as_f64() {
                    Some(v) => {
                        let t = if hi > lo { (v - lo) / span } else { 1.0 };
                        (viridis(t), format!("{:.2}", v), t)
                    }
                    None => (MISSING_GRAY, String::new(), 1.0),
                };
                self.marks.push(Mark::Cell {
                    x0: x - 0.5,
                    y0: y - 0.5,
                    x1: x + 0.5,
                    y1: y + 0.5,
                    color,
                });
                if !text.is_empty() {
                    self.marks.push(Mark::Label {
                        x,
                        y,
                        text,
                        light: t < 0.5,
                    });
                }
            }
        }
        self.x_labels = Some(names.clone());
        self.y_labels = Some(names.into_iter().take(n_rows).rev().collect());
    }

    fn push_density(&mut self, points: &[(f64, f64)]) {
        let grid = StatsCalculator::density_grid(points, DENSITY_GRID);
        let (x0, x1) = bounds(points.iter().map(|p| p.0));
        let (y0, y1) = bounds(points.iter().map(|p| p.1));
        let dx = if x1 > x0 { (x1 - x0) / DENSITY_GRID as f64 } else { 1.0 / DENSITY_GRID as f64 };
        let dy = if y1 > y0 { (y1 - y0) / DENSITY_GRID as f64 } else { 1.0 / DENSITY_GRID as f64 };

        for (row, cells) in grid.iter().enumerate() {
            for (col, &density) in cells.iter().enumerate() {
                if density <= 0.0 {
                    continue;
                }
                let cx0 = x0 + dx * col as f64;
                let cy0 = y0 + dy * row as f64;
                self.marks.push(Mark::Cell {
                    x0: cx0,
                    y0: cy0,
                    x1: cx0 + dx,
                    y1: cy0 + dy,
                    color: viridis(density),
                });
            }
        }
    }

    fn has_legend(&self) -> bool {
        self.marks.iter().any(|m| {
            matches!(
                m,
                Mark::Line { legend: Some(_), .. }
                    | Mark::Markers { legend: Some(_), .. }
                    | Mark::Rect { legend: Some(_), .. }
            )
        })
    }

    /// Data ranges with padding; categorical axes extend half a slot past each end.
    fn ranges(&self) -> ((f64, f64), (f64, f64)) {
        let mut extent = Vec::new();
        for mark in &self.marks {
            mark.extent(&mut extent);
        }
        let (mut x0, mut x1) = bounds(extent.iter().map(|p| p.0));
        let (mut y0, mut y1) = bounds(extent.iter().map(|p| p.1));

        if let Some(labels) = &self.x_labels {
            x0 = x0.min(-0.5);
            x1 = x1.max(labels.len() as f64 - 0.5);
        }
        if let Some(labels) = &self.y_labels {
            y0 = y0.min(-0.5);
            y1 = y1.max(labels.len() as f64 - 0.5);
        }
        (padded((x0, x1)), padded((y0, y1)))
    }
}

/// Map x scalars to axis positions: numbers stay put, text becomes category slots.
fn positions(xs: &[Scalar]) -> (Vec<Option<f64>>, Option<Vec<String>>) {
    if xs.iter().any(|s| matches!(s, Scalar::Text(_))) {
        let labels: Vec<String> = xs.iter().map(Scalar::label).collect();
        let cats = unique_labels(labels.iter());
        let pos = labels
            .iter()
            .map(|l| cats.iter().position(|c| c == l).map(|i| i as f64))
            .collect();
        (pos, Some(cats))
    } else {
        (xs.iter().map(Scalar::as_f64).collect(), None)
    }
}

fn unique_labels<'a, I>(labels: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

/// Marker radii in pixels; bubble sizes use plotly's area sizing.
fn marker_radii(trace: &Trace, n: usize) -> Vec<u32> {
    let Some(marker) = &trace.marker else {
        return vec![4; n];
    };
    let sizeref = marker.sizeref.unwrap_or(1.0).max(f64::EPSILON);
    let sizes = marker.size.as_deref().unwrap_or_default();
    (0..n)
        .map(|i| {
            let size = sizes.get(i).and_then(Scalar::as_f64).unwrap_or(0.0).abs();
            ((size / sizeref).sqrt() / 2.0).clamp(2.0, 40.0) as u32
        })
        .collect()
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}

fn axis_label(labels: Option<&[String]>, v: f64) -> String {
    match labels {
        Some(labels) => {
            let idx = v.round();
            if (v - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        }
        None => {
            if v.abs() >= 1000.0 || v.fract() == 0.0 {
                format!("{:.0}", v)
            } else {
                format!("{:.2}", v)
            }
        }
    }
}

fn axis_title(figure: &Figure, x: bool) -> String {
    let axis = if x { &figure.layout.xaxis } else { &figure.layout.yaxis };
    axis.as_ref()
        .and_then(|a| a.title.as_ref())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

/// Angle 0 points up, increasing clockwise.
fn polar_to_px(center: (f64, f64), r: f64, angle: f64) -> (i32, i32) {
    (
        (center.0 + r * angle.sin()).round() as i32,
        (center.1 - r * angle.cos()).round() as i32,
    )
}

fn wedge_points(center: (f64, f64), inner: f64, outer: f64, a0: f64, a1: f64) -> Vec<(i32, i32)> {
    let steps = (((a1 - a0) / (PI / 90.0)).ceil() as usize).max(2);
    let arc = |r: f64| -> Vec<(i32, i32)> {
        (0..=steps)
            .map(|i| polar_to_px(center, r, a0 + (a1 - a0) * i as f64 / steps as f64))
            .collect()
    };
    let mut points = arc(outer);
    if inner > 0.0 {
        points.extend(arc(inner).into_iter().rev());
    } else {
        points.push(polar_to_px(center, 0.0, 0.0));
    }
    points
}

/// Binary split of weighted items into tiles, splitting along the longer side.
fn partition(items: &[(usize, f64)], rect: (f64, f64, f64, f64), out: &mut Vec<(usize, (f64, f64, f64, f64))>) {
    match items {
        [] => {}
        [(idx, _)] => out.push((*idx, rect)),
        _ => {
            let total: f64 = items.iter().map(|(_, v)| v).sum();
            let mut acc = 0.0;
            let mut split = 1;
            for (i, (_, v)) in items.iter().enumerate() {
                acc += v;
                if acc >= total / 2.0 {
                    split = (i + 1).clamp(1, items.len() - 1);
                    break;
                }
            }
            let (head, tail) = items.split_at(split);
            let share = head.iter().map(|(_, v)| v).sum::<f64>() / total;
            let (x0, y0, x1, y1) = rect;
            let (a, b) = if x1 - x0 >= y1 - y0 {
                let xm = x0 + (x1 - x0) * share;
                ((x0, y0, xm, y1), (xm, y0, x1, y1))
            } else {
                let ym = y0 + (y1 - y0) * share;
                ((x0, y0, x1, ym), (x0, ym, x1, y1))
            };
            partition(head, a, out);
            partition(tail, b, out);
        }
    }
}

/// Drawing backend wrapper that keeps rendering when no usable font is installed:
/// text that cannot be laid out is skipped and its size estimated from the font size.
pub struct TextSafeBackend<DB> {
    inner: DB,
}

impl<DB> TextSafeBackend<DB> {
    pub fn new(inner: DB) -> Self {
        Self { inner }
    }
}

impl<DB: DrawingBackend> DrawingBackend for TextSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: plotters_backend::BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: plotters_backend::BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: plotters_backend::BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: plotters_backend::BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn fill_polygon<S: plotters_backend::BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.fill_polygon(vert, style)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let inner = &mut self.inner;
        match panic::catch_unwind(panic::AssertUnwindSafe(|| inner.draw_text(text, style, pos))) {
            Ok(Err(DrawingErrorKind::FontError(e))) => {
                debug!(error = %e, "font unavailable, text skipped");
                Ok(())
            }
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.estimate_text_size(text, style)
        })) {
            Ok(Ok(size)) => Ok(size),
            _ => {
                let px = style.size().max(1.0);
                let width = text.chars().count() as f64 * px * 0.6;
                Ok((width.ceil() as u32, px.ceil() as u32))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartKind, ChartPlotter};
    use crate::data::{sample_dataframe, ColumnRoles, ColumnStrategy};

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    #[test]
    fn every_sample_chart_rasterises() {
        let df = sample_dataframe().unwrap();
        let roles = ColumnRoles::resolve(&df, &ColumnStrategy::Positional).unwrap();
        for kind in ChartKind::ALL {
            let fig = ChartPlotter::build(kind, &df, &roles).unwrap();
            let png = StaticChartRenderer::render_png(&fig, 480, 320)
                .unwrap_or_else(|e| panic!("{} failed: {}", kind, e));
            assert!(png.starts_with(&PNG_MAGIC), "{} is not a PNG", kind);
        }
    }

    #[test]
    fn empty_figure_and_zero_size_are_errors() {
        assert!(matches!(
            StaticChartRenderer::render_png(&Figure::empty(), 10, 10),
            Err(RenderError::EmptyFigure)
        ));
        let fig = StaticChartRenderer::sine_wave_figure();
        assert!(matches!(
            StaticChartRenderer::render_png(&fig, 0, 10),
            Err(RenderError::InvalidSize(0, 10))
        ));
    }

    #[test]
    fn sine_wave_has_hundred_points_on_zero_to_ten() {
        let fig = StaticChartRenderer::sine_wave_figure();
        let x = fig.data[0].x.as_ref().unwrap();
        assert_eq!(x.len(), 100);
        assert_eq!(x.first(), Some(&Scalar::Number(0.0)));
        assert_eq!(x.last(), Some(&Scalar::Number(10.0)));
        assert_eq!(fig.title_text(), Some("Live Line Plot"));
    }

    #[test]
    fn data_uri_has_png_prefix() {
        let uri = StaticChartRenderer::to_data_uri(&[1, 2, 3]);
        assert_eq!(uri, "data:image/png;base64,AQID");
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0), RGBColor(68, 1, 84));
        assert_eq!(viridis(1.0), RGBColor(253, 231, 37));
        assert_eq!(viridis(f64::NAN), RGBColor(68, 1, 84));
    }

    #[test]
    fn partition_covers_every_item_once() {
        let items = vec![(0, 5.0), (1, 3.0), (2, 2.0)];
        let mut tiles = Vec::new();
        partition(&items, (0.0, 0.0, 100.0, 50.0), &mut tiles);
        let mut ids: Vec<usize> = tiles.iter().map(|(i, _)| *i).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2]);
        let area: f64 = tiles
            .iter()
            .map(|(_, (x0, y0, x1, y1))| (x1 - x0) * (y1 - y0))
            .sum();
        assert!((area - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn categorical_axis_labels_only_on_slots() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert_eq!(axis_label(Some(&labels), 1.0), "B");
        assert_eq!(axis_label(Some(&labels), 0.5), "");
        assert_eq!(axis_label(Some(&labels), 5.0), "");
        assert_eq!(axis_label(None, 2.5), "2.50");
    }

    struct FontlessBackend;

    impl DrawingBackend for FontlessBackend {
        type ErrorType = std::io::Error;

        fn get_size(&self) -> (u32, u32) {
            (10, 10)
        }

        fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
            Ok(())
        }

        fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
            Ok(())
        }

        fn draw_pixel(
            &mut self,
            _point: BackendCoord,
            _color: BackendColor,
        ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
            Ok(())
        }

        fn draw_text<TStyle: BackendTextStyle>(
            &mut self,
            _text: &str,
            _style: &TStyle,
            _pos: BackendCoord,
        ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
            panic!("no fonts");
        }

        fn estimate_text_size<TStyle: BackendTextStyle>(
            &self,
            _text: &str,
            _style: &TStyle,
        ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
            panic!("no fonts");
        }
    }

    #[test]
    fn text_panics_are_contained() {
        let mut backend = TextSafeBackend::new(FontlessBackend);
        let style = TextStyle::from(("sans-serif", 12).into_font());
        assert!(backend.draw_text("abc", &style, (0, 0)).is_ok());
        assert_eq!(backend.estimate_text_size("abc", &style).unwrap(), (22, 12));
    }
}
