use crate::types::*;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub log_level: String,
    /// When false the cold-start restore still runs, but reports no session
    /// without touching the stored record.
    pub restore_session_on_launch: bool,
    pub diagnostics_enabled: bool,
}

impl Display for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AppSettings {{ log_level: {}, restore_session_on_launch: {}, diagnostics_enabled: {} }}",
            self.log_level, self.restore_session_on_launch, self.diagnostics_enabled
        )
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            restore_session_on_launch: true,
            diagnostics_enabled: true,
        }
    }
}

static SETTINGS: OnceCell<Mutex<AppSettings>> = OnceCell::new();

fn settings_path() -> SbResult<PathBuf> {
    let dir = crate::session_store::data_dir()?;
    Ok(dir.join("sb-settings.json"))
}

fn load_from(p: &Path) -> AppSettings {
    match fs::read(p) {
        Ok(bytes) => match serde_json::from_slice::<AppSettings>(&bytes) {
            Ok(s) => s,
            Err(_) => AppSettings::default(),
        },
        Err(_) => AppSettings::default(),
    }
}

fn save_to(p: &Path, s: &AppSettings) -> SbResult<()> {
    if let Some(parent) = p.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let data = serde_json::to_vec_pretty(s)
        .map_err(|e| err_not_retriable(format!("serialize settings failed: {e}")))?;
    fs::write(p, data).map_err(|e| err_storage(format!("write settings failed: {e}")))?;
    Ok(())
}

pub fn init() -> SbResult<()> {
    let s = match settings_path() {
        Ok(p) => load_from(&p),
        Err(_) => AppSettings::default(),
    };
    let _ = SETTINGS.set(Mutex::new(s));
    if let Some(lock) = SETTINGS.get() {
        let cur = lock.lock().unwrap_or_else(|p| p.into_inner()).clone();
        crate::logger::set_level_str(&cur.log_level);
    }
    Ok(())
}

pub fn get() -> AppSettings {
    if let Some(lock) = SETTINGS.get() {
        return lock.lock().unwrap_or_else(|p| p.into_inner()).clone();
    }
    AppSettings::default()
}

pub fn set(new_settings: AppSettings) -> SbResult<()> {
    crate::logger::info("settings", &format!("applying {}", new_settings));
    if SETTINGS.get().is_none() {
        let _ = SETTINGS.set(Mutex::new(new_settings.clone()));
    } else if let Some(lock) = SETTINGS.get() {
        let mut g = lock.lock().unwrap_or_else(|p| p.into_inner());
        *g = new_settings.clone();
    }
    save_to(&settings_path()?, &new_settings)?;
    crate::logger::set_level_str(&new_settings.log_level);
    Ok(())
}

#[tauri::command]
pub async fn settings_get() -> SbResult<AppSettings> {
    Ok(get())
}

#[tauri::command]
pub async fn settings_set(settings: AppSettings) -> SbResult<()> {
    set(settings)
}
