use std::time::Duration;

use crate::output::OutputFormat;

/// Default refresh interval of top-style gadgets.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of rows a top-style gadget shows per interval.
pub const DEFAULT_MAX_ROWS: usize = 20;

/// Runtime options of one report, separated from the CLI parsing concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Sort tokens, e.g. `["-reads", "comm"]`. Empty = gadget default.
    pub sort: Vec<String>,
    /// Columns to show in the text table. Empty = every visible column.
    pub columns: Vec<String>,
    /// `column:<expr>` row filters, all of which must match.
    pub filters: Vec<String>,
    pub format: OutputFormat,
    /// Rows rendered per batch (0 = unlimited)
    pub max_rows: usize,
    /// Refresh interval for top-style gadgets
    pub interval: Duration,
    /// Number of intervals to render (0 = unlimited)
    pub count: u64,
    /// Stop after this long (0 = indefinite)
    pub duration: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            sort: Vec::new(),
            columns: Vec::new(),
            filters: Vec::new(),
            format: OutputFormat::Columns,
            max_rows: 0,
            interval: DEFAULT_INTERVAL,
            count: 0,
            duration: Duration::ZERO,
        }
    }
}

impl ReportConfig {
    pub fn max_rows(&self) -> Option<usize> {
        (self.max_rows > 0).then_some(self.max_rows)
    }

    pub fn count(&self) -> Option<u64> {
        (self.count > 0).then_some(self.count)
    }

    pub fn duration(&self) -> Option<Duration> {
        (!self.duration.is_zero()).then_some(self.duration)
    }
}
