//! Pure projections of the live window for the chart, table and status panels.

#[cfg(feature = "app")]
pub mod commands;
pub mod chart;
pub mod status;
pub mod table;

use serde::Serialize;

use crate::live::LiveSnapshot;

pub use chart::{ChartPoint, ChartSeries};
pub use status::{LiveRow, StatusSummary};
pub use table::TableRow;

/// Number of readings the chart and table show.
pub const CHART_DEPTH: usize = 15;

/// Everything the UI redraws after a window change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveViews {
    pub snapshot: LiveSnapshot,
    pub chart: ChartSeries,
    pub table: Vec<TableRow>,
    pub live_rows: Vec<LiveRow>,
    pub status: StatusSummary,
}

impl LiveViews {
    pub fn build(snapshot: LiveSnapshot, depth: usize) -> Self {
        let chart = ChartSeries::build(&snapshot.readings, depth);
        let table = table::table_rows(&snapshot.readings, depth);
        let live_rows = status::live_rows(&snapshot.readings);
        let status = StatusSummary::build(&snapshot);
        Self {
            snapshot,
            chart,
            table,
            live_rows,
            status,
        }
    }
}

/// The newest `depth` readings, oldest first.
fn recent<T>(items: &[T], depth: usize) -> &[T] {
    &items[items.len().saturating_sub(depth)..]
}
