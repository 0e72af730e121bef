// Real Estate Dashboard - Core Library
// Exposes all modules for use in CLI, web server, and tests

pub mod table;   // Loader: CSV → polars DataFrame
pub mod stats;   // Quantiles, IQR fences, grouped means
pub mod charts;  // Plotly figure specs
pub mod render;  // Distribution renderer
pub mod html;    // Page → HTML document
pub mod config;  // Defaults, JSON config, CLI flags

// Re-export commonly used types
pub use table::{
    load_csv, normalize_header,
    CellValue, Column, ColumnStatus, ColumnType, DataTable, Dataset, TableError, NA_VALUES,
};
pub use stats::{
    box_summary, grouped_mean, iqr_bounds, tukey_fences,
    BoxSummary, GroupMean, StatsError,
};
pub use charts::{ChartKind, ChartSpec, LineTrace, BoxTrace};
pub use render::{
    render, render_from_config, resolve_year_column,
    Block, Page, Slot, CATEGORY_COLUMNS, YEAR_COLUMN,
};
pub use html::{render_html, write_page};
pub use config::{CliArgs, Command, DashboardConfig, DatasetSource, Overrides, PageConfig, PageLayout};

/// Install the stderr `tracing` subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
