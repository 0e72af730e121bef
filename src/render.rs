// 🎨 Distribution Renderer
// datasets × categorical columns → page of box and line plot specs
//
// Best-effort per dataset: a missing column only ever skips its own slot.

use crate::charts::{ChartSpec, LineTrace};
use crate::config::{DashboardConfig, PageConfig, PageLayout};
use crate::stats::grouped_mean;
use crate::table::{CellValue, Column, ColumnStatus, Dataset};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

/// Transaction and property attributes broken down on the page, in display order.
pub const CATEGORY_COLUMNS: [&str; 10] = [
    "trans_group_en",
    "procedure_name_en",
    "property_type_en",
    "property_sub_type_en",
    "property_usage_en",
    "reg_type_en",
    "nearest_landmark_en",
    "nearest_metro_en",
    "nearest_mall_en",
    "rooms_en",
];

/// Canonical year header; `instance_Year` etc. resolve to it via header normalization.
pub const YEAR_COLUMN: &str = "instance_year";

// ============================================================================
// PAGE MODEL
// ============================================================================

/// One cell of a row: the charts for a single dataset.
/// Empty when the dataset lacks the row's column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Slot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub charts: Vec<ChartSpec>,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.charts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Title { text: String },
    Header { text: String },
    Subheader { text: String },
    Warning { text: String },
    Chart { chart: ChartSpec },
    Row { slots: Vec<Slot> },
    Separator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub page_title: String,
    pub layout: PageLayout,
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(config: &PageConfig) -> Self {
        Page {
            page_title: config.page_title.clone(),
            layout: config.layout,
            blocks: vec![Block::Title {
                text: config.title.clone(),
            }],
        }
    }

    /// Every chart on the page in display order, rows flattened left to right.
    pub fn charts(&self) -> Vec<&ChartSpec> {
        self.blocks
            .iter()
            .flat_map(|block| match block {
                Block::Chart { chart } => vec![chart],
                Block::Row { slots } => slots.iter().flat_map(|s| s.charts.iter()).collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Warning { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

// ============================================================================
// RENDER
// ============================================================================

/// Build the whole page. Pure: identical inputs give an identical page.
pub fn render(datasets: &[Dataset], target: &str, config: &PageConfig) -> Page {
    let mut page = Page::new(config);

    // Overall distribution per dataset
    for dataset in datasets {
        page.push(Block::Header {
            text: format!("📊 Target Distribution Analysis for: {}", dataset.name),
        });

        match dataset.table.has_column(target) {
            ColumnStatus::Numeric => page.push(Block::Chart {
                chart: overall_box(dataset, target),
            }),
            ColumnStatus::Text => {
                warn!(dataset = %dataset.name, column = target, "target column is not numeric");
                page.push(Block::Warning {
                    text: format!(
                        "Target column '{}' is not numeric in {}. Skipping this dataset.",
                        target, dataset.name
                    ),
                });
            }
            ColumnStatus::Absent => {
                warn!(dataset = %dataset.name, column = target, "target column not found");
                page.push(Block::Warning {
                    text: format!(
                        "Target column '{}' not found in {}. Skipping this dataset.",
                        target, dataset.name
                    ),
                });
            }
        }
    }

    // Breakdown by each categorical column; one slot per dataset
    for column in CATEGORY_COLUMNS {
        page.push(Block::Subheader {
            text: format!("📌 Box & Line Plots by: {}", column),
        });

        let slots = datasets
            .iter()
            .map(|dataset| category_slot(dataset, column, target))
            .collect();

        page.push(Block::Row { slots });
        page.push(Block::Separator);
    }

    page
}

/// Load the configured datasets and render them.
pub fn render_from_config(config: &DashboardConfig) -> Result<Page> {
    let datasets = config.load_datasets()?;
    Ok(render(&datasets, &config.target, &config.page_config()))
}

fn category_slot(dataset: &Dataset, column: &str, target: &str) -> Slot {
    let table = &dataset.table;

    if !table.has_column(column).is_present() {
        // Silent on purpose: only a missing target is reported
        debug!(dataset = %dataset.name, column, "category column absent, slot left empty");
        return Slot::default();
    }
    if !table.has_column(target).is_numeric() {
        return Slot::default();
    }

    let mut charts = vec![category_box(dataset, column, target)];

    match resolve_year_column(dataset) {
        Some(year) => charts.push(year_line(dataset, year.name(), column, target)),
        None => debug!(dataset = %dataset.name, column, "no year column, line plot skipped"),
    }

    Slot {
        label: Some(dataset.name.clone()),
        charts,
    }
}

pub fn resolve_year_column(dataset: &Dataset) -> Option<Column> {
    dataset.table.column(YEAR_COLUMN)
}

fn overall_box(dataset: &Dataset, target: &str) -> ChartSpec {
    let values = dataset
        .table
        .column(target)
        .map(|c| c.numeric_values())
        .unwrap_or_default();

    ChartSpec::box_plot(
        format!("Overall Boxplot of {} ({})", target, dataset.name),
        None,
        None,
        values,
    )
}

fn category_box(dataset: &Dataset, column: &str, target: &str) -> ChartSpec {
    let table = &dataset.table;
    let mut labels = Vec::new();
    let mut values = Vec::new();

    if let (Some(category), Some(target_col)) = (table.column(column), table.column(target)) {
        for (label, value) in category.values().into_iter().zip(target_col.numbers()) {
            if let (Some(label), Some(value)) = (label, value) {
                labels.push(label.to_string());
                values.push(value);
            }
        }
    }

    ChartSpec::box_plot(
        format!("Box Plot by {} ({})", column, dataset.name),
        Some(column),
        Some(labels),
        values,
    )
}

fn year_line(dataset: &Dataset, year_column: &str, column: &str, target: &str) -> ChartSpec {
    let means = grouped_mean(&dataset.table, year_column, column, target).unwrap_or_else(|e| {
        warn!(dataset = %dataset.name, column, error = %e, "grouped mean failed, line plot left empty");
        Vec::new()
    });

    // Means come year-major; series appear in the order their category first shows up
    let mut keys: Vec<CellValue> = Vec::new();
    let mut series: Vec<LineTrace> = Vec::new();
    for m in means {
        let i = match keys.iter().position(|k| *k == m.group) {
            Some(i) => i,
            None => {
                series.push(LineTrace::new(m.group.to_string()));
                keys.push(m.group);
                series.len() - 1
            }
        };
        series[i].x.push(m.x);
        series[i].y.push(m.mean);
    }

    ChartSpec::line_plot(
        format!("Line Plot by {} and {} ({})", year_column, column, dataset.name),
        column,
        series,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartKind;
    use crate::table::DataTable;

    fn dataset(name: &str, csv: &str) -> Dataset {
        Dataset::new(name, DataTable::from_reader(csv.as_bytes()).unwrap())
    }

    fn page_config() -> PageConfig {
        DashboardConfig::default().page_config()
    }

    fn row_for<'a>(page: &'a Page, column: &str) -> &'a [Slot] {
        let heading = format!("📌 Box & Line Plots by: {}", column);
        let pos = page
            .blocks
            .iter()
            .position(|b| matches!(b, Block::Subheader { text } if *text == heading))
            .unwrap();
        match &page.blocks[pos + 1] {
            Block::Row { slots } => slots,
            other => panic!("expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_page_structure() {
        let ds = dataset(
            "A",
            "rooms_en,instance_year,meter_sale_price\n1 B/R,2020,100\nStudio,2021,200\n",
        );

        let page = render(&[ds], "meter_sale_price", &page_config());

        assert!(matches!(&page.blocks[0], Block::Title { .. }));
        assert!(matches!(&page.blocks[1], Block::Header { .. }));
        assert!(matches!(&page.blocks[2], Block::Chart { .. }));
        // title + header + chart + 10 × (subheader, row, separator)
        assert_eq!(page.blocks.len(), 3 + 3 * CATEGORY_COLUMNS.len());
        assert_eq!(page.charts().len(), 3);
        assert!(page.warnings().is_empty());
    }

    #[test]
    fn test_missing_target_warns_and_other_datasets_render() {
        let a = dataset("A", "rooms_en,meter_sale_price\nStudio,100\n");
        let b = dataset("B", "rooms_en,other\nStudio,100\n");

        let page = render(&[a, b], "meter_sale_price", &page_config());

        assert_eq!(
            page.warnings(),
            vec!["Target column 'meter_sale_price' not found in B. Skipping this dataset."]
        );
        let b_charts: Vec<_> = page.charts().into_iter().filter(|c| c.title().ends_with("(B)")).collect();
        assert!(b_charts.is_empty());
        assert!(page.charts().iter().any(|c| c.title() == "Overall Boxplot of meter_sale_price (A)"));
    }

    #[test]
    fn test_missing_category_leaves_empty_slot_and_continues() {
        let a = dataset("A", "property_type_en,rooms_en,meter_sale_price\nUnit,Studio,100\n");
        let b = dataset("B", "rooms_en,meter_sale_price\nStudio,100\n");

        let page = render(&[a, b], "meter_sale_price", &page_config());

        let property = row_for(&page, "property_type_en");
        assert_eq!(property.len(), 2);
        assert_eq!(property[0].label.as_deref(), Some("A"));
        assert_eq!(property[0].charts[0].kind(), ChartKind::Box);
        assert!(property[1].is_empty());

        let rooms = row_for(&page, "rooms_en");
        assert!(!rooms[0].is_empty());
        assert!(!rooms[1].is_empty());
        assert!(page.warnings().is_empty());
    }

    #[test]
    fn test_row_has_one_slot_per_dataset_even_when_all_absent() {
        let a = dataset("A", "meter_sale_price\n1\n");
        let b = dataset("B", "meter_sale_price\n2\n");
        let c = dataset("C", "meter_sale_price\n3\n");

        let page = render(&[a, b, c], "meter_sale_price", &page_config());

        let slots = row_for(&page, "nearest_mall_en");
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(Slot::is_empty));
    }

    #[test]
    fn test_year_column_controls_line_plot() {
        let with_year = dataset("Y", "rooms_en,instance_year,meter_sale_price\nStudio,2020,1\n");
        let capitalized = dataset("C", "rooms_en,instance_Year,meter_sale_price\nStudio,2020,1\n");
        let without_year = dataset("N", "rooms_en,year,meter_sale_price\nStudio,2020,1\n");

        let page = render(&[with_year, capitalized, without_year], "meter_sale_price", &page_config());
        let slots = row_for(&page, "rooms_en");

        let kinds = |slot: &Slot| slot.charts.iter().map(|c| c.kind()).collect::<Vec<_>>();
        assert_eq!(kinds(&slots[0]), vec![ChartKind::Box, ChartKind::Line]);
        assert_eq!(kinds(&slots[1]), vec![ChartKind::Box, ChartKind::Line]);
        assert_eq!(kinds(&slots[2]), vec![ChartKind::Box]);
        assert_eq!(
            slots[1].charts[1].title(),
            "Line Plot by instance_Year and rooms_en (C)"
        );
    }

    #[test]
    fn test_line_series_are_grouped_means() {
        let ds = dataset(
            "A",
            "rooms_en,instance_year,meter_sale_price\nA,2021,300\nA,2020,100\nA,2020,200\nB,2020,10\n",
        );

        let page = render(&[ds], "meter_sale_price", &page_config());
        let line = &row_for(&page, "rooms_en")[0].charts[1];
        let series: Vec<_> = line.line_traces().collect();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "A");
        let points: Vec<(CellValue, f64)> = series[0].points().map(|(x, y)| (x.clone(), y)).collect();
        assert_eq!(
            points,
            vec![(CellValue::Number(2020.0), 150.0), (CellValue::Number(2021.0), 300.0)]
        );
        assert_eq!(series[1].name, "B");
    }

    #[test]
    fn test_line_series_follow_first_year_order() {
        let ds = dataset(
            "A",
            "rooms_en,instance_year,meter_sale_price\nA,2021,300\nZ,2020,100\nA,2022,200\n",
        );

        let page = render(&[ds], "meter_sale_price", &page_config());
        let line = &row_for(&page, "rooms_en")[0].charts[1];
        let names: Vec<&str> = line.line_traces().map(|t| t.name.as_str()).collect();

        assert_eq!(names, vec!["Z", "A"]);
    }

    #[test]
    fn test_null_target_cell_still_renders_dataset() {
        let ds = dataset("A", "rooms_en,meter_sale_price\nStudio,100\nStudio,NULL\n1 B/R,300\n");

        let page = render(&[ds], "meter_sale_price", &page_config());

        assert!(page.warnings().is_empty());
        assert_eq!(page.charts().len(), 2);
        let trace = row_for(&page, "rooms_en")[0].charts[0].box_traces().next().unwrap();
        assert_eq!(trace.y, vec![100.0, 300.0]);
    }

    #[test]
    fn test_category_box_labels_align_with_values() {
        let ds = dataset("A", "rooms_en,meter_sale_price\nStudio,100\n,50\n1 B/R,\n1 B/R,300\n");

        let page = render(&[ds], "meter_sale_price", &page_config());
        let chart = &row_for(&page, "rooms_en")[0].charts[0];
        let trace = chart.box_traces().next().unwrap();

        assert_eq!(trace.x.as_deref(), Some(&["Studio".to_string(), "1 B/R".to_string()][..]));
        assert_eq!(trace.y, vec![100.0, 300.0]);
        assert_eq!(chart.layout.xaxis.title.as_ref().unwrap().text, "rooms_en");
    }

    #[test]
    fn test_render_is_idempotent() {
        let ds = dataset(
            "A",
            "rooms_en,reg_type_en,instance_year,meter_sale_price\nStudio,Off-Plan,2020,100\n1 B/R,Ready,2021,200\n",
        );
        let datasets = vec![ds];

        let first = render(&datasets, "meter_sale_price", &page_config());
        let second = render(&datasets, "meter_sale_price", &page_config());

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_text_target_is_reported_and_skipped() {
        let ds = dataset("A", "rooms_en,meter_sale_price\nStudio,cheap\n");

        let page = render(&[ds], "meter_sale_price", &page_config());

        assert_eq!(page.warnings().len(), 1);
        assert!(page.charts().is_empty());
    }
}
