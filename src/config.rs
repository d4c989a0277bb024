//! Process and dashboard configuration.

use crate::charts::ChartKind;
use clap::{ArgAction, Parser, ValueEnum};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Export size must be non-zero, got {0}x{1}")]
    ExportSize(u32, u32),
    #[error("Upload limit must be at least 1 MB")]
    UploadLimit,
}

/// Which chart types the dropdown offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ChartSet {
    /// line, bar, scatter, histogram, heatmap, pie
    Basic,
    /// every supported chart type
    #[default]
    Extended,
}

impl ChartSet {
    pub fn kinds(self) -> &'static [ChartKind] {
        match self {
            ChartSet::Basic => &ChartKind::BASIC,
            ChartSet::Extended => &ChartKind::ALL,
        }
    }

    pub fn contains(self, kind: ChartKind) -> bool {
        self.kinds().contains(&kind)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chartify-web")]
#[command(about = "Upload a CSV, Excel or JSON file and chart it in the browser")]
#[command(version)]
pub struct ServerArgs {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 8050)]
    pub port: u16,

    #[arg(long, env = "CHARTIFY_CHART_SET", value_enum, default_value_t = ChartSet::Extended)]
    pub chart_set: ChartSet,

    /// Offer PNG export of the sample dataset
    #[arg(long, env = "CHARTIFY_EXPORT", default_value_t = true, action = ArgAction::Set)]
    pub export: bool,

    /// Show the sine-wave demo under the line chart
    #[arg(long, env = "CHARTIFY_LIVE_PREVIEW", default_value_t = true, action = ArgAction::Set)]
    pub live_preview: bool,

    /// Largest accepted file in MB, before base64 encoding in the request body
    #[arg(long, env = "CHARTIFY_MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,

    #[arg(long, env = "CHARTIFY_EXPORT_WIDTH", default_value_t = 1200)]
    pub export_width: u32,

    #[arg(long, env = "CHARTIFY_EXPORT_HEIGHT", default_value_t = 800)]
    pub export_height: u32,
}

impl ServerArgs {
    pub fn dashboard_config(&self) -> Result<DashboardConfig, ConfigError> {
        let config = DashboardConfig {
            chart_set: self.chart_set,
            export_enabled: self.export,
            live_preview_enabled: self.live_preview,
            export_size: (self.export_width, self.export_height),
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Framework-free dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub chart_set: ChartSet,
    pub export_enabled: bool,
    pub live_preview_enabled: bool,
    pub export_size: (u32, u32),
    pub max_upload_bytes: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            chart_set: ChartSet::Extended,
            export_enabled: true,
            live_preview_enabled: true,
            export_size: (1200, 800),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Room for the JSON envelope and data URI prefix around the encoded file.
const REQUEST_OVERHEAD: usize = 64 * 1024;

impl DashboardConfig {
    /// Body limit for `/api/chart`: base64 grows the file by 4/3.
    pub fn request_body_limit(&self) -> usize {
        self.max_upload_bytes
            .div_ceil(3)
            .saturating_mul(4)
            .saturating_add(REQUEST_OVERHEAD)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (w, h) = self.export_size;
        if w == 0 || h == 0 {
            return Err(ConfigError::ExportSize(w, h));
        }
        if self.max_upload_bytes < 1024 * 1024 {
            return Err(ConfigError::UploadLimit);
        }
        Ok(())
    }
}
