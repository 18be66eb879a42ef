//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Color only an interactive stdout, and never with `NO_COLOR` set.
pub fn should_color() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// `on` / `off` label, green or dimmed when coloring.
pub fn paint_power(on: bool, color: bool) -> String {
    match (on, color) {
        (true, true) => "on".green().to_string(),
        (false, true) => "off".dimmed().to_string(),
        (true, false) => "on".into(),
        (false, false) => "off".into(),
    }
}

pub fn paint_connected(connected: bool, color: bool) -> String {
    match (connected, color) {
        (true, true) => "connected".green().to_string(),
        (false, true) => "disconnected".red().to_string(),
        (true, false) => "connected".into(),
        (false, false) => "disconnected".into(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serializable items in the chosen format.
///
/// - `table`: builds rows with `to_row` and renders them with `tabled`
/// - `json` / `json-compact`: serializes the original data via serde
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single item. Table mode uses `detail_fn`'s pre-formatted
/// key/value block instead of a one-row table.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Aligned `key: value` block for detail views.
pub fn detail_block(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(k, v)| format!("{k:>width$}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        key: String,
        state: u8,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                key: "AA:BB_17".into(),
                state: 1,
            },
            Row {
                key: "AA:BB_18".into(),
                state: 0,
            },
        ]
    }

    fn row_ref(r: &Row) -> Row {
        Row {
            key: r.key.clone(),
            state: r.state,
        }
    }

    #[test]
    fn plain_lists_one_identifier_per_line() {
        let out = render_list(OutputFormat::Plain, &rows(), row_ref, |r| r.key.clone()).unwrap();
        assert_eq!(out, "AA:BB_17\nAA:BB_18");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out =
            render_list(OutputFormat::JsonCompact, &rows(), row_ref, |r| r.key.clone()).unwrap();
        assert_eq!(
            out,
            r#"[{"key":"AA:BB_17","state":1},{"key":"AA:BB_18","state":0}]"#
        );
    }

    #[test]
    fn table_has_headers() {
        let out = render_list(OutputFormat::Table, &rows(), row_ref, |r| r.key.clone()).unwrap();
        assert!(out.contains("key"));
        assert!(out.contains("AA:BB_18"));
    }

    #[test]
    fn detail_block_right_aligns_keys() {
        let out = detail_block(&[("name", "Lamp".into()), ("state", "1".into())]);
        assert_eq!(out, " name: Lamp\nstate: 1");
    }

    #[test]
    fn uncolored_labels_are_plain_words() {
        assert_eq!(paint_power(true, false), "on");
        assert_eq!(paint_connected(false, false), "disconnected");
    }
}
