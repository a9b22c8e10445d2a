use tauri::State;

use crate::{alerts::AlertThresholds, db::Notification, AppState};

const DEFAULT_LIST_LIMIT: usize = 100;

#[tauri::command]
pub async fn list_notifications(
    state: State<'_, AppState>,
    limit: Option<usize>,
) -> Result<Vec<Notification>, String> {
    state
        .ctx
        .db
        .list_notifications(limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_notification(
    state: State<'_, AppState>,
    id: String,
) -> Result<Option<Notification>, String> {
    state
        .ctx
        .db
        .get_notification(&id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mark_notification_read(state: State<'_, AppState>, id: String) -> Result<(), String> {
    state
        .ctx
        .db
        .mark_notification_read(&id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn mark_all_notifications_read(state: State<'_, AppState>) -> Result<usize, String> {
    state
        .ctx
        .db
        .mark_all_notifications_read()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_unread_count(state: State<'_, AppState>) -> Result<u64, String> {
    state
        .ctx
        .db
        .unread_notification_count()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn clear_notifications(state: State<'_, AppState>) -> Result<usize, String> {
    state
        .ctx
        .db
        .clear_notifications()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_alert_thresholds(state: State<'_, AppState>) -> AlertThresholds {
    state.ctx.settings.alert_thresholds()
}

#[tauri::command]
pub fn set_alert_thresholds(
    state: State<'_, AppState>,
    thresholds: AlertThresholds,
) -> Result<(), String> {
    state
        .ctx
        .settings
        .set_alert_thresholds(thresholds)
        .map_err(|e| e.to_string())
}
