use tauri::State;

use crate::{source::SourceMode, AppState};

#[tauri::command]
pub async fn select_source(state: State<'_, AppState>, mode: SourceMode) -> Result<u64, String> {
    state
        .ctx
        .select_source(mode)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_source_mode(state: State<'_, AppState>) -> Option<SourceMode> {
    state.ctx.sources.current_mode()
}
