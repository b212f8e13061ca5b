use crate::logger::LogLevel;
use crate::types::*;
use serde_json::json;

/// Stand-in identity when a restored session carries no email.
pub const IDENTITY_PLACEHOLDER: &str = "unknown";

/// Opaque snapshot of the process arguments at launch. The shell never
/// interprets these itself; they ride along for diagnostics and for the
/// second-instance forwarding path.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    args: Vec<String>,
}

impl LaunchOptions {
    pub fn from_env() -> LaunchOptions {
        LaunchOptions {
            args: std::env::args().skip(1).collect(),
        }
    }

    pub fn new(args: Vec<String>) -> LaunchOptions {
        LaunchOptions { args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn as_json(&self) -> serde_json::Value {
        json!({ "argCount": self.len() })
    }
}

/// What became of the best-effort session restore. Exactly one of these is
/// reported per launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { email: Option<String> },
    NoSession,
    Failed { message: String },
}

pub fn restore_outcome(result: &SbResult<Option<SessionUser>>) -> RestoreOutcome {
    match result {
        Ok(Some(user)) => RestoreOutcome::Restored {
            email: user.email.clone(),
        },
        Ok(None) => RestoreOutcome::NoSession,
        Err(e) => RestoreOutcome::Failed {
            message: e.message.clone(),
        },
    }
}

pub fn restore_log_line(outcome: &RestoreOutcome) -> (LogLevel, String) {
    match outcome {
        RestoreOutcome::Failed { message } => {
            (LogLevel::Error, format!("restore failed: {message}"))
        }
        RestoreOutcome::Restored { email } => (
            LogLevel::Info,
            format!(
                "restored previous session for {}",
                email.as_deref().unwrap_or(IDENTITY_PLACEHOLDER)
            ),
        ),
        RestoreOutcome::NoSession => (LogLevel::Info, "no previous session found".to_string()),
    }
}

/// Runs detached from the launch path; whatever happens here never delays
/// or fails the start of the app.
pub async fn run_restore() {
    let result = crate::auth::restore_previous_sign_in().await;
    let (level, line) = restore_log_line(&restore_outcome(&result));
    crate::logger::log(level, "bootstrap", &line);
}

/// The launch steps in their required order: configure the diagnostics
/// client, register platform hooks, then kick off the restore without
/// waiting for it. Either of the first two failing aborts the launch.
pub fn launch_sequence<C, R, S>(
    opts: &LaunchOptions,
    configure: C,
    register: R,
    spawn_restore: S,
) -> SbResult<()>
where
    C: FnOnce() -> SbResult<()>,
    R: FnOnce() -> SbResult<()>,
    S: FnOnce(),
{
    crate::logger::debug(
        "bootstrap",
        &format!("cold start with {} launch argument(s)", opts.len()),
    );
    configure()?;
    register()?;
    spawn_restore();
    Ok(())
}

pub fn cold_start(app: &tauri::AppHandle, opts: &LaunchOptions) -> SbResult<()> {
    let handle = app.clone();
    launch_sequence(
        opts,
        crate::backend::configure,
        || crate::registrant::register_all(&handle),
        || {
            tauri::async_runtime::spawn(run_restore());
        },
    )?;
    crate::backend::client()?.track("app_launched", opts.as_json());
    Ok(())
}

/// Where an inbound URL ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlDisposition {
    /// Consumed by the sign-in flow; nothing else sees it.
    Auth,
    /// Forwarded to the frontend as a plain deep link.
    Default,
}

/// The sign-in flow gets first refusal on every inbound URL.
pub fn route_url<F>(raw: &str, auth_handles: F) -> UrlDisposition
where
    F: FnOnce(&str) -> bool,
{
    if auth_handles(raw) {
        UrlDisposition::Auth
    } else {
        UrlDisposition::Default
    }
}

// Inbound URLs can carry one-time codes in the query; keep those out of logs.
fn redacted(raw: &str) -> String {
    match raw.split_once('?') {
        Some((base, _)) => format!("{base}?..."),
        None => raw.to_string(),
    }
}

/// Entry point for every URL the platform hands us, whichever door it came
/// through. Returns true when the sign-in flow consumed it.
pub fn open_url(app: &tauri::AppHandle, raw: &str) -> bool {
    match route_url(raw, |u| crate::auth::handle_redirect(app, u)) {
        UrlDisposition::Auth => {
            crate::logger::debug(
                "bootstrap",
                &format!("url handled by sign-in: {}", redacted(raw)),
            );
            true
        }
        UrlDisposition::Default => {
            crate::logger::debug(
                "bootstrap",
                &format!("url forwarded to frontend: {}", redacted(raw)),
            );
            use tauri::{Emitter, Manager};
            let _ = app.emit("sb://deep_link", json!({ "url": raw }));
            if let Some(win) = app.get_webview_window("main") {
                let _ = win.set_focus();
            }
            false
        }
    }
}
