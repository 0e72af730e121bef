// ⚙️ Configuration - defaults → JSON file → command-line overrides

use crate::table::{load_csv, Dataset};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_PATH: &str = "new_tdf.csv";
pub const DEFAULT_DATASET_NAME: &str = "Dubai Transactions";
pub const DEFAULT_TARGET: &str = "meter_sale_price";
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLayout {
    Wide,
    Centered,
}

/// Page-level settings handed to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Browser tab title
    pub page_title: String,
    /// Heading at the top of the page
    pub title: String,
    pub layout: PageLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub name: String,
    pub path: PathBuf,
}

impl DatasetSource {
    /// Parse `label=path`, or a bare path labelled by its file stem.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, path) = match spec.split_once('=') {
            Some((name, path)) => (name.trim().to_string(), PathBuf::from(path.trim())),
            None => {
                let path = PathBuf::from(spec.trim());
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, path)
            }
        };

        if name.is_empty() || path.as_os_str().is_empty() {
            bail!("Invalid dataset '{}': expected LABEL=PATH or PATH", spec);
        }

        Ok(DatasetSource { name, path })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub page_title: String,
    pub title: String,
    pub layout: PageLayout,
    pub target: String,
    pub datasets: Vec<DatasetSource>,
    pub addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            page_title: "Real Estate Dashboard & Target Distribution".to_string(),
            title: "🏙️ Dubai Real Estate Dashboard & Target Distribution".to_string(),
            layout: PageLayout::Wide,
            target: DEFAULT_TARGET.to_string(),
            datasets: vec![DatasetSource {
                name: DEFAULT_DATASET_NAME.to_string(),
                path: PathBuf::from(DEFAULT_DATA_PATH),
            }],
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn page_config(&self) -> PageConfig {
        PageConfig {
            page_title: self.page_title.clone(),
            title: self.title.clone(),
            layout: self.layout,
        }
    }

    /// Load every configured dataset, in order. The first failure aborts.
    pub fn load_datasets(&self) -> Result<Vec<Dataset>> {
        self.datasets
            .iter()
            .map(|source| Ok(Dataset::new(source.name.clone(), load_csv(&source.path)?)))
            .collect()
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if !overrides.datasets.is_empty() {
            self.datasets = overrides.datasets.clone();
        }
        if let Some(target) = &overrides.target {
            self.target = target.clone();
        }
        if let Some(title) = &overrides.title {
            self.title = title.clone();
        }
        if let Some(addr) = &overrides.addr {
            self.addr = addr.clone();
        }
    }
}

// ============================================================================
// COMMAND LINE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write the HTML page to a file, or stdout when no path is given
    Render { out: Option<PathBuf> },
    /// Print the page as JSON
    Json,
    /// Print IQR fences of a column for each dataset
    Bounds { column: String },
    /// Terminal chart browser
    Tui,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub datasets: Vec<DatasetSource>,
    pub target: Option<String>,
    pub title: Option<String>,
    pub addr: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub command: Command,
    pub overrides: Overrides,
}

impl CliArgs {
    /// Parse arguments (without the program name).
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut overrides = Overrides::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("Missing value for {}", flag));

            match arg.as_str() {
                "--config" => overrides.config = Some(PathBuf::from(value("--config")?)),
                "--data" => overrides.datasets.push(DatasetSource::parse(&value("--data")?)?),
                "--target" => overrides.target = Some(value("--target")?),
                "--title" => overrides.title = Some(value("--title")?),
                "--addr" => overrides.addr = Some(value("--addr")?),
                flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
                _ => positional.push(arg.clone()),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("tui") => Command::Tui,
            Some("render") => Command::Render {
                out: positional.next().map(PathBuf::from),
            },
            Some("json") => Command::Json,
            Some("bounds") => Command::Bounds {
                column: positional
                    .next()
                    .ok_or_else(|| anyhow!("Usage: bounds <COLUMN>"))?,
            },
            Some(other) => bail!("Unknown command '{}'", other),
        };

        if let Some(extra) = positional.next() {
            bail!("Unexpected argument '{}'", extra);
        }

        Ok(CliArgs { command, overrides })
    }

    /// Defaults, then the config file if given, then command-line flags.
    pub fn resolve(&self) -> Result<DashboardConfig> {
        let mut config = match &self.overrides.config {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };
        config.apply(&self.overrides);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_tui() {
        let args = CliArgs::parse(Vec::<String>::new()).unwrap();

        assert_eq!(args.command, Command::Tui);
        assert_eq!(args.resolve().unwrap(), DashboardConfig::default());
    }

    #[test]
    fn test_parse_render_with_overrides() {
        let args = CliArgs::parse([
            "render",
            "out.html",
            "--data",
            "2024=data/2024.csv",
            "--data",
            "data/older.csv",
            "--target",
            "actual_worth",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Render {
                out: Some(PathBuf::from("out.html"))
            }
        );

        let config = args.resolve().unwrap();
        assert_eq!(config.target, "actual_worth");
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[0].name, "2024");
        assert_eq!(config.datasets[1].name, "older");
        assert_eq!(config.datasets[1].path, PathBuf::from("data/older.csv"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(CliArgs::parse(["bounds"]).is_err());
        assert!(CliArgs::parse(["--target"]).is_err());
        assert!(CliArgs::parse(["--nope"]).is_err());
        assert!(CliArgs::parse(["explode"]).is_err());
        assert!(CliArgs::parse(["json", "extra"]).is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DashboardConfig = serde_json::from_str(r#"{"target": "procedure_area", "layout": "centered"}"#).unwrap();

        assert_eq!(config.target, "procedure_area");
        assert_eq!(config.layout, PageLayout::Centered);
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.datasets[0].path, PathBuf::from(DEFAULT_DATA_PATH));
    }

    #[test]
    fn test_dataset_source_rejects_empty_label() {
        assert!(DatasetSource::parse("=data.csv").is_err());
        assert!(DatasetSource::parse("label=").is_err());
    }
}
