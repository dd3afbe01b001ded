//! Column layout for listing output.
//! Widths are measured on visible characters so colored cells line up.

use terminal_size::{Width, terminal_size};

const FALLBACK_WIDTH: usize = 100;
const MIN_FLEX_WIDTH: usize = 12;
const SEPARATOR: &str = " | ";

/// A column is either sized to its widest cell or flexes to fill the terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Fit,
    Flex,
}

/// Render a table whose `Flex` column is truncated so each line fits in
/// `total_width`. Cells must be plain text; `paint` styles them per column
/// after truncation.
pub fn render_table(
    headers: &[&str],
    columns: &[Column],
    rows: &[Vec<String>],
    total_width: usize,
    paint: impl Fn(usize, &str) -> String,
) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_len(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_len(cell));
        }
    }

    if let Some(flex) = columns.iter().position(|c| *c == Column::Flex) {
        let fixed: usize = widths
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != flex)
            .map(|(_, w)| *w)
            .sum::<usize>()
            + SEPARATOR.len() * cols.saturating_sub(1);
        let available = total_width.saturating_sub(fixed).max(MIN_FLEX_WIDTH);
        widths[flex] = widths[flex].min(available);
    }

    let header_cells: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| truncate_with_ellipsis(h, widths[i]))
        .collect();
    let mut out = format_row(&header_cells, &widths);
    out.push('\n');
    out.push_str(&"=".repeat(widths.iter().sum::<usize>() + SEPARATOR.len() * (cols - 1)));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .take(cols)
            .enumerate()
            .map(|(i, cell)| paint(i, &truncate_with_ellipsis(cell, widths[i])))
            .collect();
        out.push('\n');
        out.push_str(format_row(&cells, &widths).trim_end());
    }
    out
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    let parts: Vec<String> = row
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| pad_field(cell, *width, display_len(cell)))
        .collect();
    parts.join(SEPARATOR)
}

/// Right-pad a field based on visible length (ignoring ANSI codes).
pub fn pad_field(display: &str, target: usize, plain_len: usize) -> String {
    let mut out = display.to_string();
    let padding = target.saturating_sub(plain_len);
    out.push_str(&" ".repeat(padding));
    out
}

/// Truncate text to a width, appending an ellipsis when needed.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = text.chars().count();
    if len <= max_width {
        return text.to_string();
    }
    if max_width == 1 {
        return "…".to_string();
    }
    let mut out = text.chars().take(max_width.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

/// Compute visible length of a string, ignoring ANSI escape sequences.
pub fn display_len(s: &str) -> usize {
    let mut len = 0;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        len += 1;
    }
    len
}

/// Width of the attached terminal, or a fixed fallback when piped.
pub fn terminal_width() -> usize {
    terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(FALLBACK_WIDTH)
}
