//! gadget-report library - the shared reporting pipeline of the gadgets.
//!
//! Every gadget emits its own record type. This library turns any such type
//! into sorted, filtered, fixed width tables or JSON without per-type code.
//!
//! # Modules
//!
//! - [`columns`] - column model and the per-type schema registry
//! - [`sort`] - sort directive resolution and the stable batch sorter
//! - [`filter`] - column projection and row filters
//! - [`output`] - text table and JSON renderers
//! - [`report`] - the sort/filter/render pipeline of one record type
//! - [`stream`] - trace and top style drivers
//! - [`replay`] - JSON lines event source
//! - [`gadgets`] - the gadget record types
//!
//! # Example
//!
//! ```
//! use gadget_report::gadgets::trace_signal::Event;
//! use gadget_report::Report;
//!
//! let mut report = Report::<Event>::new().unwrap();
//! report.set_sort(&["-tpid"]).unwrap();
//! let out = report
//!     .process(vec![Event { pid: 1, tpid: 2, ..Default::default() }])
//!     .unwrap();
//! assert!(out.starts_with("CONTAINER PID"));
//! ```

pub mod columns;
pub mod config;
pub mod error;
pub mod filter;
pub mod gadgets;
pub mod output;
pub mod replay;
pub mod report;
pub mod sort;
pub mod stream;

// Re-export for convenience
pub use columns::{columns_of, register, Column, FieldSet, Record, Schema, SchemaBuilder};
pub use config::ReportConfig;
pub use error::{ConfigError, Error, FormatError, SchemaError};
pub use filter::{filter_rows, Projection, RowFilter};
pub use output::{render, OutputFormat};
pub use report::Report;
pub use sort::{parse_sort, parse_sort_list, sort, SortSpec};
pub use stream::{Accumulator, BatchSource, CancelToken, StreamDriver};
