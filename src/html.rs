//! HTML page output with plotly.js charts

use crate::charts::ChartSpec;
use crate::config::PageLayout;
use crate::render::{Block, Page, Slot};
use std::io::{self, Write};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub fn render_html(page: &Page) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_page(&mut out, page);
    String::from_utf8_lossy(&out).into_owned()
}

pub fn write_page<W: Write>(writer: &mut W, page: &Page) -> io::Result<()> {
    let max_width = match page.layout {
        PageLayout::Wide => "100%",
        PageLayout::Centered => "960px",
    };

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="{plotly}"></script>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
            margin: 0;
            color: #262730;
        }}
        .container {{ max-width: {max_width}; margin: 0 auto; padding: 2rem; box-sizing: border-box; }}
        .row {{ display: grid; gap: 1rem; }}
        .slot-label {{ font-weight: 700; margin: 0.5rem 0; }}
        .chart {{ width: 100%; min-height: 450px; }}
        .warning {{
            background: #fffce7;
            border-left: 4px solid #ffbd45;
            padding: 0.75rem 1rem;
            margin: 0.5rem 0;
        }}
        hr {{ border: none; border-top: 1px solid #e6e6e6; margin: 2rem 0; }}
    </style>
</head>
<body>
<div class="container">
"#,
        title = escape(&page.page_title),
        plotly = PLOTLY_CDN,
        max_width = max_width,
    )?;

    let mut next_id = 0;

    for block in &page.blocks {
        match block {
            Block::Title { text } => writeln!(writer, "<h1>{}</h1>", escape(text))?,
            Block::Header { text } => writeln!(writer, "<h2>{}</h2>", escape(text))?,
            Block::Subheader { text } => writeln!(writer, "<h3>{}</h3>", escape(text))?,
            Block::Warning { text } => writeln!(writer, "<div class=\"warning\">⚠️ {}</div>", escape(text))?,
            Block::Chart { chart } => write_chart(writer, chart, &mut next_id)?,
            Block::Row { slots } => write_row(writer, slots, &mut next_id)?,
            Block::Separator => writeln!(writer, "<hr>")?,
        }
    }

    writeln!(writer, "</div>\n</body>\n</html>")
}

fn write_row<W: Write>(writer: &mut W, slots: &[Slot], next_id: &mut usize) -> io::Result<()> {
    writeln!(
        writer,
        "<div class=\"row\" style=\"grid-template-columns: repeat({}, minmax(0, 1fr));\">",
        slots.len().max(1)
    )?;

    for slot in slots {
        writeln!(writer, "<div class=\"slot\">")?;
        if let Some(label) = &slot.label {
            writeln!(writer, "<div class=\"slot-label\">{}</div>", escape(label))?;
        }
        for chart in &slot.charts {
            write_chart(writer, chart, next_id)?;
        }
        writeln!(writer, "</div>")?;
    }

    writeln!(writer, "</div>")
}

fn write_chart<W: Write>(writer: &mut W, chart: &ChartSpec, next_id: &mut usize) -> io::Result<()> {
    let id = format!("chart-{}", next_id);
    *next_id += 1;

    let figure = serde_json::to_string(chart).map_err(io::Error::other)?;

    writeln!(writer, "<div class=\"chart\" id=\"{}\"></div>", id)?;
    writeln!(
        writer,
        "<script>(function(){{ var fig = {}; Plotly.newPlot(\"{}\", fig.data, fig.layout, {{responsive: true}}); }})();</script>",
        escape_script(&figure),
        id
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON inside <script> must not contain a closing tag
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::render::render;
    use crate::table::{DataTable, Dataset};

    fn page(csv: &str) -> Page {
        let ds = Dataset::new("Sample <1>", DataTable::from_reader(csv.as_bytes()).unwrap());
        render(&[ds], "meter_sale_price", &DashboardConfig::default().page_config())
    }

    #[test]
    fn test_one_div_per_chart() {
        let page = page("rooms_en,instance_year,meter_sale_price\nStudio,2020,100\n");

        let html = render_html(&page);

        assert_eq!(html.matches("class=\"chart\"").count(), page.charts().len());
        assert_eq!(html.matches("Plotly.newPlot").count(), 3);
        assert!(html.contains("<hr>"));
        assert!(html.contains(PLOTLY_CDN));
    }

    #[test]
    fn test_text_is_escaped() {
        let page = page("meter_sale_price\n1\n");

        let html = render_html(&page);

        assert!(html.contains("Sample &lt;1&gt;"));
        assert!(!html.contains("<h2>📊 Target Distribution Analysis for: Sample <1>"));
    }

    #[test]
    fn test_script_json_cannot_close_tag() {
        assert_eq!(escape_script(r#"{"a":"</script>"}"#), r#"{"a":"<\/script>"}"#);
    }

    #[test]
    fn test_warning_block_is_rendered() {
        let page = page("price\n1\n");

        let html = render_html(&page);

        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("Target column &#39;meter_sale_price&#39; not found"));
    }
}
