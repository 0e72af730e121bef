use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset as ChartDataset, GraphType, List, ListItem,
        ListState, Paragraph, Row, Table, Wrap,
    },
    Frame, Terminal,
};
use realestate_dashboard::{box_summary, Block as PageBlock, ChartKind, ChartSpec, Page};
use std::collections::BTreeSet;
use std::io;

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    BoxOnly,
    LineOnly,
}

impl KindFilter {
    pub fn next(&self) -> Self {
        match self {
            KindFilter::All => KindFilter::BoxOnly,
            KindFilter::BoxOnly => KindFilter::LineOnly,
            KindFilter::LineOnly => KindFilter::All,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            KindFilter::All => "All charts",
            KindFilter::BoxOnly => "Box plots",
            KindFilter::LineOnly => "Line plots",
        }
    }

    fn accepts(&self, kind: ChartKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::BoxOnly => kind == ChartKind::Box,
            KindFilter::LineOnly => kind == ChartKind::Line,
        }
    }
}

/// A chart plus the page heading it sits under
#[derive(Debug, Clone)]
pub struct ChartEntry {
    pub section: String,
    pub chart: ChartSpec,
}

pub struct App {
    pub title: String,
    pub entries: Vec<ChartEntry>,
    pub warnings: Vec<String>,
    pub visible: Vec<usize>,
    pub state: ListState,
    pub filter: KindFilter,
    pub show_warnings: bool,
}

impl App {
    pub fn new(page: Page) -> Self {
        let mut title = page.page_title.clone();
        let mut section = String::new();
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for block in page.blocks {
            match block {
                PageBlock::Title { text } => title = text,
                PageBlock::Header { text } | PageBlock::Subheader { text } => section = text,
                PageBlock::Warning { text } => warnings.push(text),
                PageBlock::Chart { chart } => entries.push(ChartEntry {
                    section: section.clone(),
                    chart,
                }),
                PageBlock::Row { slots } => {
                    for chart in slots.into_iter().flat_map(|s| s.charts) {
                        entries.push(ChartEntry {
                            section: section.clone(),
                            chart,
                        });
                    }
                }
                PageBlock::Separator => {}
            }
        }

        let mut app = Self {
            title,
            entries,
            warnings,
            visible: Vec::new(),
            state: ListState::default(),
            filter: KindFilter::All,
            show_warnings: false,
        };
        app.apply_filter(KindFilter::All);
        app
    }

    pub fn apply_filter(&mut self, filter: KindFilter) {
        self.filter = filter;
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.accepts(e.chart.kind()))
            .map(|(i, _)| i)
            .collect();

        // Reset selection to first item
        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn cycle_filter(&mut self) {
        self.apply_filter(self.filter.next());
    }

    pub fn toggle_warnings(&mut self) {
        self.show_warnings = !self.show_warnings;
    }

    pub fn selected_entry(&self) -> Option<&ChartEntry> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|&i| self.entries.get(i))
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 10).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = self.state.selected().map(|i| i.saturating_sub(10)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn first(&mut self) {
        if !self.visible.is_empty() {
            self.state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        if !self.visible.is_empty() {
            self.state.select(Some(self.visible.len() - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.cycle_filter(),
                KeyCode::Char('w') => app.toggle_warnings(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);

    render_chart_list(f, content[0], app);

    if app.show_warnings {
        render_warnings(f, content[1], app);
    } else {
        match app.selected_entry().map(|e| e.chart.kind()) {
            Some(ChartKind::Box) => render_box_detail(f, content[1], app),
            Some(ChartKind::Line) => render_line_detail(f, content[1], app),
            None => {
                let empty = Paragraph::new("No chart selected").block(detail_block(" Chart "));
                f.render_widget(empty, content[1]);
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let boxes = app.entries.iter().filter(|e| e.chart.kind() == ChartKind::Box).count();
    let lines = app.entries.len() - boxes;

    let spans = vec![
        Span::styled(
            app.title.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(format!("▣ {} box", boxes), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(format!("╱ {} line", lines), Style::default().fg(Color::Green)),
        Span::raw("  |  "),
        Span::styled(
            format!("⚠ {}", app.warnings.len()),
            Style::default().fg(if app.warnings.is_empty() { Color::DarkGray } else { Color::Red }),
        ),
    ];

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_chart_list(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .visible
        .iter()
        .filter_map(|&i| app.entries.get(i))
        .map(|entry| {
            let (marker, color) = match entry.chart.kind() {
                ChartKind::Box => ("▣ ", Color::Cyan),
                ChartKind::Line => ("╱ ", Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(color)),
                Span::raw(entry.chart.title().to_string()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", app.filter.title())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(list, area, &mut app.state);
}

fn render_box_detail(f: &mut Frame, area: Rect, app: &App) {
    let Some(entry) = app.selected_entry() else {
        return;
    };

    let header_cells = ["Group", "N", "Min", "Q1", "Median", "Q3", "Max", "Outliers"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let rows: Vec<Row> = entry
        .chart
        .box_traces()
        .flat_map(|trace| trace.groups())
        .filter_map(|(label, values)| {
            let s = box_summary(&values)?;
            let label = if label.is_empty() { "(all)".to_string() } else { label };
            Some(Row::new(vec![
                Cell::from(truncate(&label, 24)),
                Cell::from(s.count.to_string()),
                Cell::from(format_thousands(s.min)),
                Cell::from(format_thousands(s.q1)),
                Cell::from(format_thousands(s.median)).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_thousands(s.q3)),
                Cell::from(format_thousands(s.max)),
                Cell::from(s.outliers.to_string()).style(Style::default().fg(if s.outliers > 0 {
                    Color::Red
                } else {
                    Color::DarkGray
                })),
            ]))
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(detail_block(&format!(" {} · {} ", entry.section, entry.chart.title())));

    f.render_widget(table, area);
}

fn render_line_detail(f: &mut Frame, area: Rect, app: &App) {
    let Some(entry) = app.selected_entry() else {
        return;
    };
    let series: Vec<_> = entry.chart.line_traces().collect();

    // Text years are spread over their sorted positions
    let keys: BTreeSet<_> = series.iter().flat_map(|s| s.x.iter()).collect();
    let numeric = keys.iter().all(|k| k.as_f64().is_some());
    let position = |k: &realestate_dashboard::CellValue| -> f64 {
        match k.as_f64() {
            Some(v) if numeric => v,
            _ => keys.iter().position(|other| *other == k).unwrap_or(0) as f64,
        }
    };

    let points: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| s.points().map(|(x, y)| (position(x), y)).collect())
        .collect();

    let (x_min, x_max) = bounds(points.iter().flatten().map(|p| p.0));
    let (y_min, y_max) = bounds(points.iter().flatten().map(|p| p.1));

    let datasets: Vec<ChartDataset> = series
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(i, (s, data))| {
            ChartDataset::default()
                .name(s.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();

    let x_labels: Vec<Span> = match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => vec![Span::raw(first.to_string()), Span::raw(last.to_string())],
        _ => Vec::new(),
    };

    let chart = Chart::new(datasets)
        .block(detail_block(&format!(" {} · {} ", entry.section, entry.chart.title())))
        .x_axis(
            Axis::default()
                .title("Year")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("AED / m²")
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format_thousands(y_min)),
                    Span::raw(format_thousands(y_max)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_warnings(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = if app.warnings.is_empty() {
        vec![Line::from(Span::styled("  No warnings", Style::default().fg(Color::DarkGray)))]
    } else {
        app.warnings
            .iter()
            .map(|w| Line::from(vec![Span::styled("  ⚠ ", Style::default().fg(Color::Yellow)), Span::raw(w.clone())]))
            .collect()
    };

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(detail_block(" Warnings "));

    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Chart: {}/{} ", selected, app.visible.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Filter | "),
        Span::styled("w", Style::default().fg(Color::Yellow)),
        Span::raw(" Warnings | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn detail_block(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title.to_string())
}

/// Min/max with a little padding so flat series stay visible
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if min == max {
        return (min - 1.0, max + 1.0);
    }
    (min, max)
}

fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if value < 0.0 && digits != "0" {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
