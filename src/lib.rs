pub mod alerts;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod ingest;
pub mod live;
pub mod models;
pub mod settings;
pub mod source;
pub mod views;
mod utils;

pub use config::AppConfig;
pub use context::{AppContext, Collaborators};

#[cfg(feature = "app")]
mod shell {
    use std::sync::Arc;

    use tauri::{Emitter, Manager, RunEvent, State};

    use crate::alerts::commands::{
        clear_notifications, get_alert_thresholds, get_notification, get_unread_count,
        list_notifications, mark_all_notifications_read, mark_notification_read,
        set_alert_thresholds,
    };
    use crate::auth::commands::{continue_as_guest, get_current_user, sign_in, sign_out, sign_up};
    use crate::settings::ColorMode;
    use crate::source::commands::{get_source_mode, select_source};
    use crate::views::commands::{
        get_chart_series, get_live_snapshot, get_status_summary, get_table_rows,
    };
    use crate::views::LiveViews;
    use crate::{AppConfig, AppContext};

    pub(crate) struct AppState {
        pub(crate) ctx: Arc<AppContext>,
    }

    #[tauri::command]
    fn get_color_mode(state: State<'_, AppState>) -> ColorMode {
        state.ctx.settings.color_mode()
    }

    #[tauri::command]
    fn toggle_color_mode(
        state: State<'_, AppState>,
        app_handle: tauri::AppHandle,
    ) -> Result<ColorMode, String> {
        let mode = state
            .ctx
            .settings
            .toggle_color_mode()
            .map_err(|e| e.to_string())?;

        app_handle
            .emit("color-mode-changed", mode)
            .map_err(|e| e.to_string())?;

        Ok(mode)
    }

    /// Forward service state changes to the webview as events.
    fn spawn_event_forwarders(app: &tauri::AppHandle, ctx: &AppContext) {
        let mut live_rx = ctx.hub.subscribe();
        let chart_depth = ctx.config.chart_depth;
        let handle = app.clone();
        tauri::async_runtime::spawn(async move {
            while live_rx.changed().await.is_ok() {
                let snapshot = live_rx.borrow_and_update().clone();
                let views = LiveViews::build(snapshot, chart_depth);
                if let Err(err) = handle.emit("live-window-updated", &views) {
                    log::warn!("failed to emit live-window-updated: {err}");
                }
            }
        });

        let mut mode_rx = ctx.sources.subscribe_mode();
        let handle = app.clone();
        tauri::async_runtime::spawn(async move {
            while mode_rx.changed().await.is_ok() {
                let mode = *mode_rx.borrow_and_update();
                if let Err(err) = handle.emit("source-mode-changed", mode) {
                    log::warn!("failed to emit source-mode-changed: {err}");
                }
            }
        });

        let mut user_rx = ctx.auth.subscribe();
        let handle = app.clone();
        tauri::async_runtime::spawn(async move {
            while user_rx.changed().await.is_ok() {
                let user = user_rx.borrow_and_update().clone();
                if let Err(err) = handle.emit("auth-state-changed", &user) {
                    log::warn!("failed to emit auth-state-changed: {err}");
                }
            }
        });

        let mut notification_rx = ctx.alerts.subscribe();
        let handle = app.clone();
        tauri::async_runtime::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match notification_rx.recv().await {
                    Ok(notification) => {
                        if let Err(err) = handle.emit("notification-created", &notification) {
                            log::warn!("failed to emit notification-created: {err}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("dropped {skipped} notification events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let config = AppConfig::from_env();
        let level = if config.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();

        log::info!("AquaWatch starting up...");

        let app = tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(move |app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;

                    // The context spawns its workers, so build it on the runtime.
                    let ctx = tauri::async_runtime::block_on(async move {
                        AppContext::start(config, &app_data_dir)
                    })?;
                    let ctx = Arc::new(ctx);

                    spawn_event_forwarders(app.handle(), &ctx);
                    app.manage(AppState { ctx });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                get_live_snapshot,
                get_chart_series,
                get_table_rows,
                get_status_summary,
                select_source,
                get_source_mode,
                sign_in,
                sign_up,
                continue_as_guest,
                sign_out,
                get_current_user,
                list_notifications,
                get_notification,
                mark_notification_read,
                mark_all_notifications_read,
                get_unread_count,
                clear_notifications,
                get_color_mode,
                toggle_color_mode,
                get_alert_thresholds,
                set_alert_thresholds,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application");

        app.run(|handle, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = handle.try_state::<AppState>() {
                    tauri::async_runtime::block_on(state.ctx.shutdown());
                }
            }
        });
    }
}

#[cfg(feature = "app")]
pub(crate) use shell::AppState;
#[cfg(feature = "app")]
pub use shell::run;
