use tauri::State;

use crate::{
    live::LiveSnapshot,
    views::{ChartSeries, StatusSummary, TableRow},
    AppState,
};

#[tauri::command]
pub fn get_live_snapshot(state: State<'_, AppState>) -> LiveSnapshot {
    state.ctx.hub.snapshot()
}

#[tauri::command]
pub fn get_chart_series(state: State<'_, AppState>) -> ChartSeries {
    state.ctx.live_views().chart
}

#[tauri::command]
pub fn get_table_rows(state: State<'_, AppState>) -> Vec<TableRow> {
    state.ctx.live_views().table
}

#[tauri::command]
pub fn get_status_summary(state: State<'_, AppState>) -> StatusSummary {
    state.ctx.live_views().status
}
