//! Rendering
//!
//! - **sink**: the [`ViewSink`] trait and an in-memory implementation
//! - **format**: money, hours and date formatting

pub mod format;
pub mod sink;

pub use sink::{ChartSeries, MemorySink, TableRow, ViewSink};
