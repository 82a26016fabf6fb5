//! The per-gadget reporting pipeline: sort, filter, limit, render.

use crate::columns::{register, Record, Schema};
use crate::config::ReportConfig;
use crate::error::{ConfigError, Error, SchemaError};
use crate::filter::{filter_rows, Projection, RowFilter};
use crate::output::{self, OutputFormat};
use crate::sort::{self, parse_sort, SortSpec};

/// Active view settings for one record type.
///
/// Every setter resolves its input first and only replaces the active
/// setting on success, so a rejected directive leaves the report as it was.
pub struct Report<T: Record> {
    schema: &'static Schema<T>,
    sort: SortSpec<'static, T>,
    projection: Projection<'static, T>,
    filter: RowFilter<'static, T>,
    format: OutputFormat,
    max_rows: Option<usize>,
}

impl<T: Record> Report<T> {
    /// Register `T` and start from its default sort and projection.
    pub fn new() -> Result<Self, SchemaError> {
        let schema = register::<T>()?;
        let sort = parse_sort::<T, &str>(&[], schema)
            .map_err(|source| SchemaError::InvalidDefaultSort {
                type_name: schema.type_name(),
                source,
            })?;
        Ok(Report {
            schema,
            sort,
            projection: Projection::default_for(schema),
            filter: RowFilter::none(),
            format: OutputFormat::default(),
            max_rows: None,
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, Error> {
        let mut report = Self::new()?
            .with_format(config.format)
            .with_max_rows(config.max_rows());
        report.set_sort(&config.sort)?;
        report.set_columns(&config.columns)?;
        report.set_filters(&config.filters)?;
        Ok(report)
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn schema(&self) -> &'static Schema<T> {
        self.schema
    }

    pub fn sort_spec(&self) -> &SortSpec<'static, T> {
        &self.sort
    }

    pub fn projection(&self) -> &Projection<'static, T> {
        &self.projection
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Empty tokens fall back to the gadget's default chain.
    pub fn set_sort<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<(), ConfigError> {
        self.sort = parse_sort(tokens, self.schema)?;
        Ok(())
    }

    /// Columns for the text table, in the order given.
    pub fn set_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ConfigError> {
        self.projection = Projection::ordered(self.schema, names)?;
        Ok(())
    }

    pub fn set_filters<S: AsRef<str>>(&mut self, filters: &[S]) -> Result<(), ConfigError> {
        self.filter = RowFilter::parse(filters, self.schema)?;
        Ok(())
    }

    /// Sort, filter and cut the batch down to the row limit.
    pub fn prepare(&self, mut batch: Vec<T>) -> Vec<T> {
        sort::sort(&mut batch, &self.sort);
        let mut batch = filter_rows(batch, &self.filter);
        if let Some(max_rows) = self.max_rows {
            batch.truncate(max_rows);
        }
        batch
    }

    pub fn render(&self, batch: &[T]) -> Result<String, serde_json::Error> {
        output::render(self.schema, &self.projection, batch, self.format)
    }

    /// Run a batch through the whole pipeline.
    pub fn process(&self, batch: Vec<T>) -> Result<String, serde_json::Error> {
        let batch = self.prepare(batch);
        self.render(&batch)
    }
}
