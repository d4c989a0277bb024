//! Charts module - chart selection, figure model and static rendering

mod figure;
mod kind;
mod plotter;
mod renderer;

pub use figure::{Axis, Figure, Layout, Marker, Polar, Scalar, Title, Trace, TraceType, ZValues};
pub use kind::{ChartKind, ChartOption};
pub use plotter::{ChartBuilder, ChartError, ChartPlotter};
pub use renderer::{palette, viridis, RenderError, StaticChartRenderer, TextSafeBackend};
