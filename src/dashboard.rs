//! Upload-to-chart resolution pipeline shared by every route.

use crate::charts::{ChartError, ChartKind, ChartOption, ChartPlotter, Figure, RenderError, StaticChartRenderer};
use crate::config::DashboardConfig;
use crate::data::{sample_dataframe, ColumnRoles, ColumnStrategy, DataLoader, DatasetSummary, SAMPLE_NAME};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const UNSUPPORTED_FILE: &str = "Unsupported file type. Please upload a CSV, Excel, or JSON file.";
pub const SELECT_GRAPH: &str = "Select a graph type to display.";
pub const NO_FILE: &str = "No file selected.";

const PREVIEW_SIZE: (u32, u32) = (640, 480);

pub fn cannot_generate(chart_type: &str) -> String {
    format!("Graph '{}' cannot be generated. Try Line Plot, Bar Chart, or Histogram.", chart_type)
}

pub fn not_recognised(chart_type: &str) -> String {
    format!(
        "Graph '{}' is not a recognised chart type. Try Line Plot, Bar Chart, or Histogram.",
        chart_type
    )
}

pub fn file_label(filename: Option<&str>) -> String {
    match filename {
        Some(name) if !name.is_empty() => format!("File Selected: {}", name),
        _ => NO_FILE.to_string(),
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export is disabled")]
    Disabled,
    #[error("{0}")]
    Chart(String),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub contents: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub use_sample: bool,
    #[serde(default)]
    pub columns: ColumnStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartResponse {
    pub figure: Figure,
    pub suggestion: String,
    pub status: String,
    pub file_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DatasetSummary>,
}

impl ChartResponse {
    fn inert(status: &str, file_label: String, summary: Option<DatasetSummary>) -> Self {
        Self {
            figure: Figure::empty(),
            suggestion: String::new(),
            status: status.to_string(),
            file_label,
            summary,
        }
    }

    fn failed(suggestion: String, file_label: String, summary: Option<DatasetSummary>) -> Self {
        Self {
            figure: Figure::empty(),
            suggestion,
            status: String::new(),
            file_label,
            summary,
        }
    }
}

enum Dataset<'a> {
    Sample(&'a DataFrame),
    Uploaded(DataFrame),
    Missing,
    Unsupported,
}

impl Dataset<'_> {
    fn frame(&self) -> Option<&DataFrame> {
        match self {
            Dataset::Sample(df) => Some(df),
            Dataset::Uploaded(df) => Some(df),
            Dataset::Missing | Dataset::Unsupported => None,
        }
    }
}

/// One configurable dashboard covering the basic, extended and sample-data variants.
pub struct Dashboard {
    config: DashboardConfig,
    sample: DataFrame,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> PolarsResult<Self> {
        Ok(Self {
            config,
            sample: sample_dataframe()?,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn chart_options(&self) -> Vec<ChartOption> {
        self.config
            .chart_set
            .kinds()
            .iter()
            .copied()
            .map(ChartOption::from)
            .collect()
    }

    /// Parse an identifier against the active chart set.
    pub fn chart_kind(&self, chart_type: &str) -> Result<ChartKind, ChartError> {
        let kind: ChartKind = chart_type.parse()?;
        if self.config.chart_set.contains(kind) {
            Ok(kind)
        } else {
            Err(ChartError::UnknownChartType(chart_type.to_string()))
        }
    }

    /// Resolve one interaction into a figure plus user-facing text. Never fails.
    pub fn render(&self, req: &ChartRequest) -> ChartResponse {
        let filename = if req.use_sample {
            Some(SAMPLE_NAME)
        } else {
            req.filename.as_deref()
        };
        let label = file_label(filename);
        let dataset = self.dataset(req);

        let chart_type = match req.chart_type.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                let summary = dataset.frame().map(DatasetSummary::of);
                return ChartResponse::inert(SELECT_GRAPH, label, summary);
            }
        };

        let df = match (&dataset, dataset.frame()) {
            (_, Some(df)) => df,
            (Dataset::Unsupported, None) => {
                return ChartResponse::failed(UNSUPPORTED_FILE.to_string(), label, None)
            }
            (_, None) => return ChartResponse::inert(SELECT_GRAPH, label, None),
        };
        let summary = DatasetSummary::of(df);

        let kind = match self.chart_kind(chart_type) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(error = %e, "chart type rejected");
                return ChartResponse::failed(not_recognised(chart_type), label, Some(summary));
            }
        };

        match Self::figure_for(kind, df, &req.columns) {
            Ok(figure) => ChartResponse {
                figure,
                suggestion: String::new(),
                status: summary.status_line(),
                file_label: label,
                summary: Some(summary),
            },
            Err(e) => {
                warn!(chart = %kind, error = %e, "chart construction failed");
                ChartResponse::failed(cannot_generate(chart_type), label, Some(summary))
            }
        }
    }

    fn dataset(&self, req: &ChartRequest) -> Dataset<'_> {
        if req.use_sample {
            return Dataset::Sample(&self.sample);
        }
        match (req.contents.as_deref(), req.filename.as_deref()) {
            (Some(contents), Some(name)) if !contents.is_empty() => match DataLoader::resolve(contents, name) {
                Some(df) => Dataset::Uploaded(df),
                None => Dataset::Unsupported,
            },
            _ => Dataset::Missing,
        }
    }

    fn figure_for(kind: ChartKind, df: &DataFrame, strategy: &ColumnStrategy) -> Result<Figure, ChartError> {
        let roles = ColumnRoles::resolve(df, strategy)?;
        debug!(chart = %kind, category = %roles.category, "column roles resolved");
        ChartPlotter::build(kind, df, &roles)
    }

    /// Render the sample dataset for `chart_type` to PNG, named `chart_<id>.png`.
    pub fn export(&self, chart_type: &str) -> Result<(String, Vec<u8>), ExportError> {
        if !self.config.export_enabled {
            return Err(ExportError::Disabled);
        }
        let kind = self
            .chart_kind(chart_type)
            .map_err(|_| ExportError::Chart(not_recognised(chart_type)))?;
        let figure = Self::figure_for(kind, &self.sample, &ColumnStrategy::Positional).map_err(|e| {
            warn!(chart = %kind, error = %e, "export construction failed");
            ExportError::Chart(cannot_generate(chart_type))
        })?;

        let (w, h) = self.config.export_size;
        let png = StaticChartRenderer::render_png(&figure, w, h).map_err(|e| {
            warn!(chart = %kind, error = %e, "export render failed");
            e
        })?;
        Ok((format!("chart_{}.png", kind.id()), png))
    }

    /// Data URI of the sine-wave demo for `line`, empty otherwise.
    pub fn live_preview(&self, chart_type: &str) -> String {
        if !self.config.live_preview_enabled || chart_type != ChartKind::Line.id() {
            return String::new();
        }
        let (w, h) = PREVIEW_SIZE;
        match StaticChartRenderer::sine_wave_png(w, h) {
            Ok(png) => StaticChartRenderer::to_data_uri(&png),
            Err(e) => {
                warn!(error = %e, "live preview render failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartSet;

    fn dashboard() -> Dashboard {
        Dashboard::new(DashboardConfig::default()).unwrap()
    }

    fn sample_request(chart_type: &str) -> ChartRequest {
        ChartRequest {
            chart_type: Some(chart_type.to_string()),
            use_sample: true,
            ..Default::default()
        }
    }

    #[test]
    fn no_upload_is_inert() {
        let resp = dashboard().render(&ChartRequest {
            chart_type: Some("line".into()),
            ..Default::default()
        });
        assert!(resp.figure.is_empty());
        assert!(resp.suggestion.is_empty());
        assert_eq!(resp.status, SELECT_GRAPH);
        assert_eq!(resp.file_label, NO_FILE);
    }

    #[test]
    fn no_chart_type_is_inert_but_summarised() {
        let resp = dashboard().render(&ChartRequest {
            use_sample: true,
            ..Default::default()
        });
        assert!(resp.figure.is_empty());
        assert!(resp.suggestion.is_empty());
        assert_eq!(resp.summary.map(|s| s.rows), Some(5));
        assert_eq!(resp.file_label, "File Selected: sample.csv");
    }

    #[test]
    fn no_chart_type_wins_over_unsupported_upload() {
        let resp = dashboard().render(&ChartRequest {
            contents: Some("data:text/plain;base64,aGVsbG8=".into()),
            filename: Some("notes.txt".into()),
            ..Default::default()
        });
        assert!(resp.figure.is_empty());
        assert!(resp.suggestion.is_empty());
        assert_eq!(resp.status, SELECT_GRAPH);
        assert!(resp.summary.is_none());
        assert_eq!(resp.file_label, "File Selected: notes.txt");
    }

    #[test]
    fn unsupported_upload_with_chart_type_is_reported() {
        let resp = dashboard().render(&ChartRequest {
            contents: Some("data:text/plain;base64,aGVsbG8=".into()),
            filename: Some("notes.txt".into()),
            chart_type: Some("line".into()),
            ..Default::default()
        });
        assert!(resp.figure.is_empty());
        assert_eq!(resp.suggestion, UNSUPPORTED_FILE);
    }

    #[test]
    fn successful_chart_reports_status_line() {
        let resp = dashboard().render(&sample_request("bar"));
        assert!(!resp.figure.is_empty());
        assert!(resp.suggestion.is_empty());
        assert_eq!(resp.status, "Loaded 5 rows, 4 columns");
    }

    #[test]
    fn basic_chart_set_rejects_extended_kinds() {
        let dash = Dashboard::new(DashboardConfig {
            chart_set: ChartSet::Basic,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(dash.chart_options().len(), 6);
        let resp = dash.render(&sample_request("radar"));
        assert!(resp.figure.is_empty());
        assert_eq!(resp.suggestion, not_recognised("radar"));
    }

    #[test]
    fn named_columns_drive_the_roles() {
        let resp = dashboard().render(&ChartRequest {
            columns: ColumnStrategy::Named {
                category: "Category".into(),
                values: vec!["Units".into()],
            },
            ..sample_request("line")
        });
        assert_eq!(resp.figure.data.len(), 1);
        assert_eq!(resp.figure.data[0].name.as_deref(), Some("Units"));
    }

    #[test]
    fn missing_named_column_is_a_construction_failure() {
        let resp = dashboard().render(&ChartRequest {
            columns: ColumnStrategy::Named {
                category: "Nope".into(),
                values: vec![],
            },
            ..sample_request("bar")
        });
        assert_eq!(resp.suggestion, cannot_generate("bar"));
    }

    #[test]
    fn export_disabled_is_an_error() {
        let dash = Dashboard::new(DashboardConfig {
            export_enabled: false,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(dash.export("line"), Err(ExportError::Disabled)));
    }

    #[test]
    fn preview_only_for_line() {
        let dash = dashboard();
        assert!(dash.live_preview("line").starts_with("data:image/png;base64,"));
        assert!(dash.live_preview("bar").is_empty());
        assert!(dash.live_preview("").is_empty());
    }
}
