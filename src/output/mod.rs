//! Output surfaces for record batches.
//!
//! Both surfaces take the same input: a schema, the active projection and an
//! already sorted and filtered batch.
//!
//! - [`OutputFormat::Columns`] - fixed width text table, see [`table`].
//! - [`OutputFormat::Json`] - one JSON object per record and line.
//! - [`OutputFormat::JsonPretty`] - one indented JSON array per batch.
//!
//! The projection only applies to the text table. JSON always carries every
//! column of the schema (hidden ones included) so that machine consumers see
//! the same content whatever the user chose to display.

mod json;
pub mod table;

pub use json::{render_json, render_json_pretty, JsonRecord};
pub use table::{render_table, truncate, ELLIPSIS, FORMAT_ERROR_PLACEHOLDER};

use std::fmt;
use std::str::FromStr;

use crate::columns::Schema;
use crate::filter::Projection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Columns,
    Json,
    JsonPretty,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "columns" | "table" => Ok(OutputFormat::Columns),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!(
                "unknown output format '{s}' (expected columns, json or json-pretty)"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Columns => "columns",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
        })
    }
}

/// Render a batch in the requested format.
pub fn render<T>(
    schema: &Schema<T>,
    projection: &Projection<'_, T>,
    batch: &[T],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Columns => Ok(render_table(projection, batch)),
        OutputFormat::Json => render_json(schema, batch),
        OutputFormat::JsonPretty => render_json_pretty(schema, batch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("columns".parse(), Ok(OutputFormat::Columns));
        assert_eq!("json".parse(), Ok(OutputFormat::Json));
        assert_eq!("json-pretty".parse(), Ok(OutputFormat::JsonPretty));
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "columns");
    }
}
