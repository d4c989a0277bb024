//! Interactive chart description, serialized in the Plotly figure JSON schema.

use serde::Serialize;

/// One cell value. Strings and dates travel as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Null,
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Display text; whole numbers print without a fraction.
    pub fn label(&self) -> String {
        match self {
            Scalar::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            Scalar::Number(v) => v.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Null => String::new(),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<Option<f64>> for Scalar {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Scalar::Null, Scalar::Number)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    Scatter,
    Bar,
    Histogram,
    Heatmap,
    Pie,
    Scatter3d,
    Box,
    Histogram2dcontour,
    Scatterpolar,
    Funnel,
    Sunburst,
    Treemap,
}

/// `z` is a flat series for 3-D traces and a grid for heatmaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ZValues {
    Series(Vec<Scalar>),
    Grid(Vec<Vec<Scalar>>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizemode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizeref: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: TraceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<ZValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<Vec<Scalar>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theta: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackgroup: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texttemplate: Option<&'static str>,
}

impl Trace {
    pub fn new(trace_type: TraceType) -> Self {
        Self {
            trace_type,
            name: None,
            mode: None,
            x: None,
            y: None,
            z: None,
            labels: None,
            parents: None,
            values: None,
            r: None,
            theta: None,
            fill: None,
            stackgroup: None,
            marker: None,
            colorscale: None,
            texttemplate: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mode(mut self, mode: &'static str) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn x(mut self, x: Vec<Scalar>) -> Self {
        self.x = Some(x);
        self
    }

    pub fn y(mut self, y: Vec<Scalar>) -> Self {
        self.y = Some(y);
        self
    }

    pub fn z(mut self, z: ZValues) -> Self {
        self.z = Some(z);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl From<&str> for Title {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl Axis {
    pub fn titled(text: &str) -> Self {
        Self {
            title: Some(text.into()),
            visible: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Polar {
    pub radialaxis: Axis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar: Option<Polar>,
}

/// The chart artifact for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn title_text(&self) -> Option<&str> {
        self.layout.title.as_ref().map(|t| t.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_figure_serializes_to_bare_shell() {
        let json = serde_json::to_string(&Figure::empty()).unwrap();
        assert_eq!(json, r#"{"data":[],"layout":{}}"#);
    }

    #[test]
    fn trace_omits_unset_fields_and_nulls_nan() {
        let trace = Trace::new(TraceType::Scatter)
            .mode("lines")
            .x(vec!["A".into(), Scalar::Null])
            .y(vec![Scalar::Number(1.0), Scalar::Number(f64::NAN)]);
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "scatter", "mode": "lines", "x": ["A", null], "y": [1.0, null]})
        );
    }

    #[test]
    fn scalar_labels() {
        assert_eq!(Scalar::Number(20.0).label(), "20");
        assert_eq!(Scalar::Number(2.5).label(), "2.5");
        assert_eq!(Scalar::Null.label(), "");
        assert_eq!(Scalar::Number(f64::NAN).as_f64(), None);
    }
}
