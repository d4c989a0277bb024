//! Chartify Web - upload a CSV, Excel or JSON file and chart it in the browser.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod stats;
pub mod web;

pub use config::{ChartSet, DashboardConfig, ServerArgs};
pub use dashboard::{ChartRequest, ChartResponse, Dashboard, ExportError};
