use crate::types::*;

/// Registers every platform hook the shell needs, in dependency order:
/// single-instance first so later plugins see a settled process, then
/// logging, then the URL-open wiring.
pub fn register_all(app: &tauri::AppHandle) -> SbResult<()> {
    register_single_instance(app)?;
    register_logging(app)?;
    register_deep_link(app)?;
    crate::logger::info("registrant", "platform hooks registered");
    Ok(())
}

fn scheme_args(argv: &[String]) -> Vec<&str> {
    let prefix = format!("{}://", crate::auth::REDIRECT_SCHEME);
    argv.iter()
        .filter(|a| a.starts_with(&prefix))
        .map(|s| s.as_str())
        .collect()
}

// Desktop platforms deliver URL opens for a running app as a second
// process invocation; the plugin folds that back into this instance.
#[cfg(not(any(target_os = "android", target_os = "ios")))]
fn register_single_instance(app: &tauri::AppHandle) -> SbResult<()> {
    app.plugin(tauri_plugin_single_instance::init(|app, argv, _cwd| {
        use tauri::Manager;
        crate::logger::debug(
            "registrant",
            &format!("second instance forwarded {} argument(s)", argv.len()),
        );
        if let Some(win) = app.get_webview_window("main") {
            let _ = win.set_focus();
        }
        for url in scheme_args(&argv) {
            crate::bootstrap::open_url(app, url);
        }
    }))
    .map_err(|e| err_config(format!("single-instance plugin: {e}")))
}

#[cfg(any(target_os = "android", target_os = "ios"))]
fn register_single_instance(_app: &tauri::AppHandle) -> SbResult<()> {
    Ok(())
}

fn register_logging(app: &tauri::AppHandle) -> SbResult<()> {
    if cfg!(debug_assertions) {
        app.plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .map_err(|e| err_config(format!("log plugin: {e}")))?;
    }
    Ok(())
}

fn register_deep_link(app: &tauri::AppHandle) -> SbResult<()> {
    app.plugin(tauri_plugin_deep_link::init())
        .map_err(|e| err_config(format!("deep-link plugin: {e}")))?;

    use tauri_plugin_deep_link::DeepLinkExt;
    let handle = app.clone();
    app.deep_link().on_open_url(move |event| {
        for url in event.urls() {
            crate::bootstrap::open_url(&handle, url.as_str());
        }
    });

    // URLs that arrived before the handler existed (cold-start opens)
    if let Ok(Some(urls)) = app.deep_link().get_current() {
        for url in urls {
            crate::bootstrap::open_url(app, url.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_args_filters_forwarded_argv() {
        let argv = vec![
            "/usr/bin/skybridge".to_string(),
            "--flag".to_string(),
            "skybridge://auth/callback?code=x".to_string(),
            "https://example.com".to_string(),
            "skybridge://share/item/42".to_string(),
        ];
        assert_eq!(
            scheme_args(&argv),
            vec![
                "skybridge://auth/callback?code=x",
                "skybridge://share/item/42"
            ]
        );
    }

    #[test]
    fn test_scheme_args_empty_when_nothing_matches() {
        let argv = vec!["/usr/bin/skybridge".to_string()];
        assert!(scheme_args(&argv).is_empty());
    }
}
