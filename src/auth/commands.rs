use tauri::State;

use crate::{auth::User, AppState};

#[tauri::command]
pub async fn sign_in(
    state: State<'_, AppState>,
    email: String,
    password: String,
) -> Result<User, String> {
    state
        .ctx
        .sign_in(&email, &password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn sign_up(
    state: State<'_, AppState>,
    email: String,
    password: String,
    display_name: Option<String>,
) -> Result<User, String> {
    state
        .ctx
        .sign_up(&email, &password, display_name.as_deref())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn continue_as_guest(state: State<'_, AppState>) -> Result<User, String> {
    state
        .ctx
        .continue_as_guest()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn sign_out(state: State<'_, AppState>) -> Result<(), String> {
    state.ctx.sign_out().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_current_user(state: State<'_, AppState>) -> Option<User> {
    state.ctx.auth.current_user()
}
