// 📊 Chart specs - plotly figure JSON
// The browser draws these; we only decide data, titles and axes

use crate::table::CellValue;
use serde::Serialize;

pub const PRICE_AXIS_TITLE: &str = "Meter Sale Price (AED)";
/// d3-format spec for thousands separators
pub const THOUSANDS_TICKFORMAT: &str = ",";
pub const GRID_COLOR: &str = "lightgray";

// ============================================================================
// TRACES
// ============================================================================

/// Raw samples for a box plot. When `x` is set it is row-aligned with `y`
/// and plotly draws one box per distinct label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<String>>,
    pub y: Vec<f64>,
}

impl BoxTrace {
    /// Samples per box, in order of first appearance.
    pub fn groups(&self) -> Vec<(String, Vec<f64>)> {
        let Some(labels) = &self.x else {
            return vec![(String::new(), self.y.clone())];
        };

        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for (label, &y) in labels.iter().zip(&self.y) {
            match groups.iter_mut().find(|(l, _)| l == label) {
                Some((_, values)) => values.push(y),
                None => groups.push((label.clone(), vec![y])),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineTrace {
    pub name: String,
    pub mode: String,
    pub x: Vec<CellValue>,
    pub y: Vec<f64>,
}

impl LineTrace {
    pub fn new(name: impl Into<String>) -> Self {
        LineTrace {
            name: name.into(),
            mode: "lines".to_string(),
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (&CellValue, f64)> + '_ {
        self.x.iter().zip(self.y.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Box(BoxTrace),
    Scatter(LineTrace),
}

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Self {
        Title { text: text.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickformat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showgrid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridwidth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gridcolor: Option<String>,
}

impl Axis {
    pub fn titled(text: impl Into<String>) -> Self {
        Axis {
            title: Some(Title::new(text)),
            ..Default::default()
        }
    }

    /// Price axis: AED title, thousands separators
    pub fn price() -> Self {
        Axis {
            tickformat: Some(THOUSANDS_TICKFORMAT.to_string()),
            ..Axis::titled(PRICE_AXIS_TITLE)
        }
    }

    pub fn with_grid(mut self) -> Self {
        self.showgrid = Some(true);
        self.gridwidth = Some(1);
        self.gridcolor = Some(GRID_COLOR.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
}

// ============================================================================
// FIGURE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Box,
    Line,
}

/// One plotly figure: `{ "data": [...], "layout": {...} }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl ChartSpec {
    /// Box plot over `y`, optionally split by row-aligned category labels.
    pub fn box_plot(title: impl Into<String>, x_title: Option<&str>, x: Option<Vec<String>>, y: Vec<f64>) -> Self {
        ChartSpec {
            data: vec![Trace::Box(BoxTrace { x, y })],
            layout: Layout {
                title: Title::new(title),
                xaxis: x_title.map(|t| Axis::titled(t)).unwrap_or_default(),
                yaxis: Axis::price(),
                legend: None,
            },
        }
    }

    /// Multi-series line plot with gridlines on both axes.
    pub fn line_plot(title: impl Into<String>, legend_title: &str, series: Vec<LineTrace>) -> Self {
        ChartSpec {
            data: series.into_iter().map(Trace::Scatter).collect(),
            layout: Layout {
                title: Title::new(title),
                xaxis: Axis::titled("Year").with_grid(),
                yaxis: Axis::price().with_grid(),
                legend: Some(Legend {
                    title: Title::new(legend_title),
                }),
            },
        }
    }

    pub fn title(&self) -> &str {
        &self.layout.title.text
    }

    pub fn kind(&self) -> ChartKind {
        match self.data.first() {
            Some(Trace::Scatter(_)) => ChartKind::Line,
            _ => ChartKind::Box,
        }
    }

    pub fn box_traces(&self) -> impl Iterator<Item = &BoxTrace> {
        self.data.iter().filter_map(|t| match t {
            Trace::Box(b) => Some(b),
            Trace::Scatter(_) => None,
        })
    }

    pub fn line_traces(&self) -> impl Iterator<Item = &LineTrace> {
        self.data.iter().filter_map(|t| match t {
            Trace::Scatter(l) => Some(l),
            Trace::Box(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_box_plot_serializes_as_plotly_figure() {
        let chart = ChartSpec::box_plot("Overall", None, None, vec![1.0, 2.0]);

        let value = serde_json::to_value(&chart).unwrap();

        assert_eq!(value["data"][0]["type"], "box");
        assert_eq!(value["data"][0]["y"], json!([1.0, 2.0]));
        assert!(value["data"][0].get("x").is_none());
        assert_eq!(value["layout"]["yaxis"]["title"]["text"], PRICE_AXIS_TITLE);
        assert_eq!(value["layout"]["yaxis"]["tickformat"], ",");
        assert_eq!(value["layout"]["xaxis"], json!({}));
    }

    #[test]
    fn test_line_plot_has_grid_and_legend() {
        let mut series = LineTrace::new("A");
        series.x.push(CellValue::Number(2020.0));
        series.y.push(150.0);

        let chart = ChartSpec::line_plot("Line", "rooms_en", vec![series]);
        let value = serde_json::to_value(&chart).unwrap();

        assert_eq!(chart.kind(), ChartKind::Line);
        assert_eq!(value["data"][0]["type"], "scatter");
        assert_eq!(value["data"][0]["mode"], "lines");
        assert_eq!(value["data"][0]["x"], json!([2020.0]));
        assert_eq!(value["layout"]["xaxis"]["showgrid"], true);
        assert_eq!(value["layout"]["yaxis"]["gridcolor"], GRID_COLOR);
        assert_eq!(value["layout"]["legend"]["title"]["text"], "rooms_en");
    }

    #[test]
    fn test_box_groups_keep_first_appearance_order() {
        let trace = BoxTrace {
            x: Some(vec!["b".into(), "a".into(), "b".into()]),
            y: vec![1.0, 2.0, 3.0],
        };

        assert_eq!(
            trace.groups(),
            vec![("b".to_string(), vec![1.0, 3.0]), ("a".to_string(), vec![2.0])]
        );
    }
}
