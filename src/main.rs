// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::io::Write;
use std::path::Path;
use tracing::info;

// Use library instead of local modules
use realestate_dashboard::{
    iqr_bounds, init_tracing, render_from_config, render_html, CliArgs, Command, DashboardConfig,
};

fn main() -> Result<()> {
    init_tracing();

    let args = CliArgs::parse(env::args().skip(1))?;
    let config = args.resolve()?;

    match args.command {
        Command::Render { out } => run_render(&config, out.as_deref())?,
        Command::Json => run_json(&config)?,
        Command::Bounds { column } => run_bounds(&config, &column)?,
        Command::Tui => run_ui_mode(&config)?,
    }

    Ok(())
}

fn run_render(config: &DashboardConfig, out: Option<&Path>) -> Result<()> {
    let page = render_from_config(config)?;
    let html = render_html(&page);

    match out {
        Some(path) => {
            std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), charts = page.charts().len(), "page written");
        }
        None => std::io::stdout().write_all(html.as_bytes())?,
    }

    Ok(())
}

fn run_json(config: &DashboardConfig) -> Result<()> {
    let page = render_from_config(config)?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn run_bounds(config: &DashboardConfig, column: &str) -> Result<()> {
    for dataset in config.load_datasets()? {
        let (lower, upper) = iqr_bounds(&dataset.table, column)
            .with_context(|| format!("IQR bounds for dataset '{}'", dataset.name))?;
        println!("{}\t{}\t{:.4}\t{:.4}", dataset.name, column, lower, upper);
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &DashboardConfig) -> Result<()> {
    info!("rendering dashboard for terminal view");

    let page = render_from_config(config)?;
    let mut app = ui::App::new(page);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &DashboardConfig) -> Result<()> {
    anyhow::bail!(
        "TUI mode not available. Rebuild with `--features tui`, or use `render`, `json`, or the realestate-server binary"
    )
}
