//! Closed set of chart types offered in the dropdown.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::ChartError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Histogram,
    Heatmap,
    Pie,
    Scatter3d,
    Line3d,
    Box,
    Bubble,
    DensityContour,
    Area,
    Polar,
    Funnel,
    Sunburst,
    Treemap,
    Radar,
}

impl ChartKind {
    /// The six types every dashboard offers.
    pub const BASIC: [ChartKind; 6] = [
        ChartKind::Line,
        ChartKind::Bar,
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::Heatmap,
        ChartKind::Pie,
    ];

    pub const ALL: [ChartKind; 17] = [
        ChartKind::Line,
        ChartKind::Bar,
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::Heatmap,
        ChartKind::Pie,
        ChartKind::Scatter3d,
        ChartKind::Line3d,
        ChartKind::Box,
        ChartKind::Bubble,
        ChartKind::DensityContour,
        ChartKind::Area,
        ChartKind::Polar,
        ChartKind::Funnel,
        ChartKind::Sunburst,
        ChartKind::Treemap,
        ChartKind::Radar,
    ];

    /// Identifier used on the wire.
    pub fn id(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Pie => "pie",
            ChartKind::Scatter3d => "scatter3d",
            ChartKind::Line3d => "line3d",
            ChartKind::Box => "box",
            ChartKind::Bubble => "bubble",
            ChartKind::DensityContour => "density_contour",
            ChartKind::Area => "area",
            ChartKind::Polar => "polar",
            ChartKind::Funnel => "funnel",
            ChartKind::Sunburst => "sunburst",
            ChartKind::Treemap => "treemap",
            ChartKind::Radar => "radar",
        }
    }

    /// Dropdown label.
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Line => "Line Plot",
            ChartKind::Bar => "Bar Chart",
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::Histogram => "Histogram",
            ChartKind::Heatmap => "Heatmap",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Scatter3d => "3D Scatter",
            ChartKind::Line3d => "3D Line",
            ChartKind::Box => "Box Plot",
            ChartKind::Bubble => "Bubble Chart",
            ChartKind::DensityContour => "Density Contour",
            ChartKind::Area => "Area Chart",
            ChartKind::Polar => "Polar Chart",
            ChartKind::Funnel => "Funnel Chart",
            ChartKind::Sunburst => "Sunburst Chart",
            ChartKind::Treemap => "Treemap",
            ChartKind::Radar => "Radar Chart",
        }
    }

    pub fn is_basic(self) -> bool {
        Self::BASIC.contains(&self)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| ChartError::UnknownChartType(s.to_string()))
    }
}

/// Dropdown option as sent to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartOption {
    pub label: &'static str,
    pub value: &'static str,
}

impl From<ChartKind> for ChartOption {
    fn from(kind: ChartKind) -> Self {
        Self {
            label: kind.label(),
            value: kind.id(),
        }
    }
}
