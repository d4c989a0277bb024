//! Stats module - correlation and summaries for charts

mod calculator;

pub use calculator::{bounds, BoxSummary, CorrelationMatrix, HistogramBins, StatsCalculator};
