//! Chart Plotter Module
//! Maps each chart type to a builder that turns a DataFrame into a Plotly figure.

use crate::charts::figure::{Axis, Figure, Layout, Marker, Polar, Scalar, Trace, TraceType, ZValues};
use crate::charts::ChartKind;
use crate::data::{ColumnRoles, DataLoader, DataProcessor};
use crate::stats::StatsCalculator;
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Unknown chart type: {0}")]
    UnknownChartType(String),
    #[error("Column not found: {0}")]
    MissingColumn(String),
    #[error("Chart needs {needed} columns, dataset has {found}")]
    NotEnoughColumns { needed: usize, found: usize },
    #[error("Column '{0}' is not numeric")]
    NonNumeric(String),
    #[error("Dataset has no numeric columns")]
    NoNumericColumns,
    #[error("Dataset has no rows")]
    EmptyData,
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// A chart builder: dataset plus column roles in, figure out.
pub type ChartBuilder = fn(&DataFrame, &ColumnRoles) -> Result<Figure, ChartError>;

/// Largest rendered bubble diameter in pixels.
const MAX_BUBBLE_PX: f64 = 40.0;

/// Creates interactive chart descriptions from tabular data.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Exhaustive chart-type dispatch table.
    pub fn builder(kind: ChartKind) -> ChartBuilder {
        match kind {
            ChartKind::Line => Self::line,
            ChartKind::Bar => Self::bar,
            ChartKind::Scatter => Self::scatter,
            ChartKind::Histogram => Self::histogram,
            ChartKind::Heatmap => Self::heatmap,
            ChartKind::Pie => Self::pie,
            ChartKind::Scatter3d => Self::scatter3d,
            ChartKind::Line3d => Self::line3d,
            ChartKind::Box => Self::box_plot,
            ChartKind::Bubble => Self::bubble,
            ChartKind::DensityContour => Self::density_contour,
            ChartKind::Area => Self::area,
            ChartKind::Polar => Self::polar,
            ChartKind::Funnel => Self::funnel,
            ChartKind::Sunburst => Self::sunburst,
            ChartKind::Treemap => Self::treemap,
            ChartKind::Radar => Self::radar,
        }
    }

    pub fn build(kind: ChartKind, df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        if df.height() == 0 {
            return Err(ChartError::EmptyData);
        }
        debug!(chart = %kind, category = %roles.category, values = ?roles.values, "building chart");
        let mut figure = Self::builder(kind)(df, roles)?;
        if figure.layout.title.is_none() {
            figure.layout.title = Some(kind.label().into());
        }
        Ok(figure)
    }

    fn numbers(df: &DataFrame, column: &str) -> Result<Vec<Scalar>, ChartError> {
        Ok(DataProcessor::numbers(df, column)?
            .into_iter()
            .map(Scalar::from)
            .collect())
    }

    fn cartesian_layout(roles: &ColumnRoles, y_title: &str) -> Layout {
        Layout {
            xaxis: Some(Axis::titled(&roles.category)),
            yaxis: Some(Axis::titled(y_title)),
            ..Layout::default()
        }
    }

    /// One value-axis title: the column name, or "value" for several series.
    fn value_title(columns: &[String]) -> &str {
        match columns {
            [single] => single.as_str(),
            _ => "value",
        }
    }

    fn series(
        df: &DataFrame,
        roles: &ColumnRoles,
        trace_type: TraceType,
        mode: Option<&'static str>,
    ) -> Result<Vec<Trace>, ChartError> {
        let x = DataProcessor::scalars(df, &roles.category)?;
        roles
            .require_values()?
            .iter()
            .map(|column| {
                let mut trace = Trace::new(trace_type)
                    .name(column.as_str())
                    .x(x.clone())
                    .y(Self::numbers(df, column)?);
                trace.mode = mode;
                Ok(trace)
            })
            .collect()
    }

    fn line(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Ok(Figure {
            data: Self::series(df, roles, TraceType::Scatter, Some("lines"))?,
            layout: Self::cartesian_layout(roles, Self::value_title(&roles.values)),
        })
    }

    fn bar(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Ok(Figure {
            data: Self::series(df, roles, TraceType::Bar, None)?,
            layout: Layout {
                barmode: Some("group"),
                ..Self::cartesian_layout(roles, Self::value_title(&roles.values))
            },
        })
    }

    fn area(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let mut data = Self::series(df, roles, TraceType::Scatter, Some("lines"))?;
        for trace in &mut data {
            trace.stackgroup = Some("one");
        }
        Ok(Figure {
            data,
            layout: Self::cartesian_layout(roles, Self::value_title(&roles.values)),
        })
    }

    fn scatter(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let y_col = roles.value(0)?;
        let trace = Trace::new(TraceType::Scatter)
            .name(y_col)
            .mode("markers")
            .x(DataProcessor::scalars(df, &roles.category)?)
            .y(Self::numbers(df, y_col)?);
        Ok(Figure {
            data: vec![trace],
            layout: Self::cartesian_layout(roles, y_col),
        })
    }

    fn histogram(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let column = roles.value(0)?;
        let trace = Trace::new(TraceType::Histogram)
            .name(column)
            .x(Self::numbers(df, column)?);
        Ok(Figure {
            data: vec![trace],
            layout: Layout {
                xaxis: Some(Axis::titled(column)),
                yaxis: Some(Axis::titled("count")),
                ..Layout::default()
            },
        })
    }

    /// Correlation of every numeric column in the dataset, not just the value roles.
    fn heatmap(df: &DataFrame, _roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let numeric = DataLoader::get_numeric_columns(df);
        if numeric.is_empty() {
            return Err(ChartError::NoNumericColumns);
        }

        let columns = numeric
            .iter()
            .map(|name| Ok((name.clone(), DataProcessor::numbers(df, name)?)))
            .collect::<Result<Vec<_>, ChartError>>()?;
        let matrix = StatsCalculator::correlation_matrix(&columns);

        let names: Vec<Scalar> = matrix.columns.iter().map(|c| c.as_str().into()).collect();
        let grid = matrix
            .values
            .iter()
            .map(|row| row.iter().map(|&v| Scalar::Number(v)).collect())
            .collect();

        let mut trace = Trace::new(TraceType::Heatmap)
            .x(names.clone())
            .y(names)
            .z(ZValues::Grid(grid));
        trace.colorscale = Some("Viridis");
        trace.texttemplate = Some("%{z:.2f}");

        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    fn pie(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let mut trace = Trace::new(TraceType::Pie);
        trace.labels = Some(DataProcessor::labels(df, &roles.category)?);
        trace.values = Some(Self::numbers(df, roles.value(0)?)?);
        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    fn three_d(df: &DataFrame, roles: &ColumnRoles, mode: &'static str) -> Result<Figure, ChartError> {
        let y_col = roles.value(0)?;
        let z_col = roles.value(1)?;
        let trace = Trace::new(TraceType::Scatter3d)
            .mode(mode)
            .x(DataProcessor::scalars(df, &roles.category)?)
            .y(Self::numbers(df, y_col)?)
            .z(ZValues::Series(Self::numbers(df, z_col)?));
        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    fn scatter3d(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Self::three_d(df, roles, "markers")
    }

    fn line3d(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Self::three_d(df, roles, "lines")
    }

    fn box_plot(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let data = roles
            .require_values()?
            .iter()
            .map(|column| {
                Ok(Trace::new(TraceType::Box)
                    .name(column.as_str())
                    .y(Self::numbers(df, column)?))
            })
            .collect::<Result<Vec<_>, ChartError>>()?;
        Ok(Figure {
            data,
            layout: Layout {
                yaxis: Some(Axis::titled(Self::value_title(&roles.values))),
                ..Layout::default()
            },
        })
    }

    /// Size comes from the second value column, or the first when there is only one.
    fn bubble(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let y_col = roles.value(0)?;
        let size_col = roles.value(1).unwrap_or(y_col);
        let sizes = Self::numbers(df, size_col)?;

        let peak = sizes
            .iter()
            .filter_map(Scalar::as_f64)
            .map(f64::abs)
            .fold(0.0, f64::max);
        let sizeref = if peak > 0.0 {
            2.0 * peak / (MAX_BUBBLE_PX * MAX_BUBBLE_PX)
        } else {
            1.0
        };

        let mut trace = Trace::new(TraceType::Scatter)
            .name(y_col)
            .mode("markers")
            .x(DataProcessor::scalars(df, &roles.category)?)
            .y(Self::numbers(df, y_col)?);
        trace.marker = Some(Marker {
            size: Some(sizes),
            sizemode: Some("area"),
            sizeref: Some(sizeref),
        });

        Ok(Figure {
            data: vec![trace],
            layout: Self::cartesian_layout(roles, y_col),
        })
    }

    fn density_contour(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let y_col = roles.value(0)?;
        let trace = Trace::new(TraceType::Histogram2dcontour)
            .x(DataProcessor::scalars(df, &roles.category)?)
            .y(Self::numbers(df, y_col)?);
        Ok(Figure {
            data: vec![trace],
            layout: Self::cartesian_layout(roles, y_col),
        })
    }

    fn polar(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let r_col = roles.value(0)?;
        let mut trace = Trace::new(TraceType::Scatterpolar)
            .name(r_col)
            .mode("lines+markers");
        trace.r = Some(Self::numbers(df, r_col)?);
        trace.theta = Some(DataProcessor::labels(df, &roles.category)?);
        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    fn funnel(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let x_col = roles.value(0)?;
        let trace = Trace::new(TraceType::Funnel)
            .name(x_col)
            .x(Self::numbers(df, x_col)?)
            .y(DataProcessor::scalars(df, &roles.category)?);
        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    /// Flat hierarchy: every category hangs off the root.
    fn hierarchy(df: &DataFrame, roles: &ColumnRoles, trace_type: TraceType) -> Result<Figure, ChartError> {
        let labels = DataProcessor::labels(df, &roles.category)?;
        let mut trace = Trace::new(trace_type);
        trace.parents = Some(vec![String::new(); labels.len()]);
        trace.labels = Some(labels);
        trace.values = Some(Self::numbers(df, roles.value(0)?)?);
        Ok(Figure {
            data: vec![trace],
            layout: Layout::default(),
        })
    }

    fn sunburst(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Self::hierarchy(df, roles, TraceType::Sunburst)
    }

    fn treemap(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        Self::hierarchy(df, roles, TraceType::Treemap)
    }

    /// One closed polar trace per value column.
    fn radar(df: &DataFrame, roles: &ColumnRoles) -> Result<Figure, ChartError> {
        let mut theta = DataProcessor::labels(df, &roles.category)?;
        if let Some(first) = theta.first().cloned() {
            theta.push(first);
        }

        let data = roles
            .require_values()?
            .iter()
            .map(|column| {
                let mut r = Self::numbers(df, column)?;
                if let Some(first) = r.first().cloned() {
                    r.push(first);
                }
                let mut trace = Trace::new(TraceType::Scatterpolar)
                    .name(column.as_str())
                    .mode("lines");
                trace.r = Some(r);
                trace.theta = Some(theta.clone());
                trace.fill = Some("toself");
                Ok(trace)
            })
            .collect::<Result<Vec<_>, ChartError>>()?;

        Ok(Figure {
            data,
            layout: Layout {
                polar: Some(Polar {
                    radialaxis: Axis {
                        title: None,
                        visible: Some(true),
                    },
                }),
                ..Layout::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnStrategy;

    fn build(kind: ChartKind, df: &DataFrame) -> Result<Figure, ChartError> {
        let roles = ColumnRoles::resolve(df, &ColumnStrategy::Positional)?;
        ChartPlotter::build(kind, df, &roles)
    }

    fn two_series() -> DataFrame {
        df!(
            "Category" => ["A", "B", "C"],
            "Left" => [1.0f64, 2.0, 3.0],
            "Right" => [3i64, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn line_has_one_trace_per_value_column() {
        let fig = build(ChartKind::Line, &two_series()).unwrap();
        let names: Vec<_> = fig.data.iter().map(|t| t.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Left", "Right"]);
        assert_eq!(fig.title_text(), Some("Line Plot"));
    }

    #[test]
    fn radar_traces_are_closed() {
        let fig = build(ChartKind::Radar, &two_series()).unwrap();
        assert_eq!(fig.data.len(), 2);
        let trace = &fig.data[0];
        let theta = trace.theta.as_ref().unwrap();
        let r = trace.r.as_ref().unwrap();
        assert_eq!(theta.first(), theta.last());
        assert_eq!(r.first(), r.last());
        assert_eq!(trace.fill, Some("toself"));
    }

    #[test]
    fn heatmap_uses_all_numeric_columns() {
        let fig = build(ChartKind::Heatmap, &two_series()).unwrap();
        let Some(ZValues::Grid(grid)) = &fig.data[0].z else {
            panic!("heatmap must carry a grid");
        };
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 2);
    }

    #[test]
    fn heatmap_without_numeric_columns_fails() {
        let df = df!("a" => ["x", "y"], "b" => ["p", "q"]).unwrap();
        assert!(matches!(
            build(ChartKind::Heatmap, &df),
            Err(ChartError::NoNumericColumns)
        ));
    }

    #[test]
    fn three_d_needs_two_value_columns() {
        let df = df!("Category" => ["A"], "Only" => [1.0f64]).unwrap();
        assert!(matches!(
            build(ChartKind::Scatter3d, &df),
            Err(ChartError::NotEnoughColumns { .. })
        ));
    }

    #[test]
    fn bubble_falls_back_to_first_value_for_size() {
        let df = df!("Category" => ["A", "B"], "Only" => [2.0f64, 4.0]).unwrap();
        let fig = build(ChartKind::Bubble, &df).unwrap();
        let marker = fig.data[0].marker.as_ref().unwrap();
        assert_eq!(
            marker.size.as_ref().unwrap(),
            &vec![Scalar::Number(2.0), Scalar::Number(4.0)]
        );
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let df = df!("Category" => Vec::<String>::new(), "Values" => Vec::<f64>::new()).unwrap();
        assert!(matches!(build(ChartKind::Bar, &df), Err(ChartError::EmptyData)));
    }

    #[test]
    fn hierarchy_hangs_from_root() {
        let fig = build(ChartKind::Treemap, &two_series()).unwrap();
        assert_eq!(fig.data[0].parents.as_ref().unwrap(), &vec![String::new(); 3]);
    }
}
