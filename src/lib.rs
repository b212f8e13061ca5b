#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  let launch = bootstrap::LaunchOptions::from_env();
  tauri::Builder::default()
    .invoke_handler(tauri::generate_handler![
      crate::bridge::auth_status,
      crate::bridge::auth_begin_sign_in,
      crate::bridge::auth_complete_sign_in,
      crate::bridge::auth_sign_out,
      crate::bridge::backend_status,
      crate::settings::settings_get,
      crate::settings::settings_set,
      crate::logger::log_tail,
      crate::logger::log_clear,
      crate::logger::log_set_level,
      crate::logger::log_get_status,
    ])
    .setup(move |app| {
      crate::logger::init(app.handle().clone())?;
      crate::settings::init()?;
      crate::bootstrap::cold_start(app.handle(), &launch)?;
      Ok(())
    })
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
pub mod types;
pub mod logger;
pub mod settings;
pub mod session_store;
pub mod backend;
pub mod auth;
pub mod bootstrap;
pub mod registrant;
pub mod bridge;
