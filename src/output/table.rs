//! Fixed width text table.
//!
//! One header row with upper-cased column names, then one row per record.
//! Cells are separated by a single space and trailing whitespace is trimmed.
//! Hidden columns are never rendered.

use std::iter;

use log::debug;

use crate::columns::{Align, Column, Ellipsis, Width};
use crate::filter::Projection;

pub const ELLIPSIS: char = '…';

/// Shown instead of a value whose formatter failed.
pub const FORMAT_ERROR_PLACEHOLDER: &str = "<?>";

pub fn render_table<T>(projection: &Projection<'_, T>, batch: &[T]) -> String {
    let columns: Vec<&Column<T>> = projection
        .columns()
        .iter()
        .copied()
        .filter(|c| c.is_visible())
        .collect();
    if columns.is_empty() {
        return String::new();
    }

    let headers: Vec<String> = columns.iter().map(|c| c.name().to_uppercase()).collect();
    let rows: Vec<Vec<String>> = batch
        .iter()
        .map(|record| columns.iter().map(|c| format_cell(c, record)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| match column.width() {
            Width::Fixed(width) => width,
            Width::Auto => rows
                .iter()
                .map(|row| row[i].chars().count())
                .chain(iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0),
        })
        .collect();

    let mut out = String::new();
    push_line(&mut out, &columns, &widths, &headers);
    for row in &rows {
        push_line(&mut out, &columns, &widths, row);
    }
    out
}

fn format_cell<T>(column: &Column<T>, record: &T) -> String {
    match column.format(record) {
        Ok(text) => text,
        Err(e) => {
            debug!("Failed to format column {}: {e}", column.name());
            FORMAT_ERROR_PLACEHOLDER.to_string()
        }
    }
}

fn push_line<T>(out: &mut String, columns: &[&Column<T>], widths: &[usize], cells: &[String]) {
    let line = columns
        .iter()
        .zip(widths)
        .zip(cells)
        .map(|((column, &width), cell)| {
            let text = truncate(cell, width, column.ellipsis());
            match column.align() {
                Align::Left => format!("{text:<width$}"),
                Align::Right => format!("{text:>width$}"),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Shorten `value` to exactly `width` characters when it is longer. The
/// ellipsis marker counts towards the width.
pub fn truncate(value: &str, width: usize, ellipsis: Ellipsis) -> String {
    let len = value.chars().count();
    if len <= width {
        return value.to_string();
    }
    if width == 0 {
        return String::new();
    }
    match ellipsis {
        Ellipsis::None => value.chars().take(width).collect(),
        Ellipsis::End => value
            .chars()
            .take(width - 1)
            .chain(iter::once(ELLIPSIS))
            .collect(),
        Ellipsis::Start => iter::once(ELLIPSIS)
            .chain(value.chars().skip(len - (width - 1)))
            .collect(),
    }
}
