use crate::types::*;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

const APP_ID: &str = "com.skybridge.app";
const MAX_QUEUED_EVENTS: usize = 256;

/// Process-wide diagnostics client. `configure` must run before anything
/// else touches it; delivery of the queued events belongs to the hosted
/// backend service, not to this shell.
pub struct BackendClient {
    app_id: &'static str,
    queue: Mutex<VecDeque<DiagnosticEvent>>,
}

#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub name: String,
    pub at: i64,
    pub attrs: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub configured: bool,
    pub app_id: String,
    pub queued_events: u32,
    pub enabled: bool,
}

static CLIENT: OnceCell<BackendClient> = OnceCell::new();

pub fn configure() -> SbResult<()> {
    if CLIENT.get().is_some() {
        // already configured; repeat calls are harmless no-ops
        return Ok(());
    }
    let _ = CLIENT.set(BackendClient {
        app_id: APP_ID,
        queue: Mutex::new(VecDeque::new()),
    });
    crate::logger::info("backend", "diagnostics client configured");
    Ok(())
}

pub fn client() -> SbResult<&'static BackendClient> {
    CLIENT
        .get()
        .ok_or_else(|| err_config("diagnostics client not configured"))
}

pub fn status() -> BackendStatus {
    let enabled = crate::settings::get().diagnostics_enabled;
    match CLIENT.get() {
        Some(c) => BackendStatus {
            configured: true,
            app_id: c.app_id.to_string(),
            queued_events: c.queued(),
            enabled,
        },
        None => BackendStatus {
            configured: false,
            app_id: APP_ID.to_string(),
            queued_events: 0,
            enabled,
        },
    }
}

impl BackendClient {
    pub fn track(&self, name: &str, attrs: serde_json::Value) {
        if !crate::settings::get().diagnostics_enabled {
            return;
        }
        let mut q = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        q.push_back(DiagnosticEvent {
            name: name.to_string(),
            at: now_ms(),
            attrs,
        });
        while q.len() > MAX_QUEUED_EVENTS {
            q.pop_front();
        }
    }

    pub fn queued(&self) -> u32 {
        let q = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        q.len() as u32
    }

    pub fn app_id(&self) -> &str {
        self.app_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Everything touching the process-wide CLIENT lives in one test so the
    // before/after assertions cannot race other tests in this binary.
    #[test]
    fn test_configure_lifecycle() {
        assert!(client().is_err());
        let st = status();
        assert!(!st.configured);
        assert_eq!(st.queued_events, 0);

        configure().unwrap();
        configure().unwrap(); // idempotent

        let c = client().unwrap();
        assert_eq!(c.app_id(), APP_ID);
        assert!(status().configured);
    }

    #[test]
    fn test_queue_is_bounded() {
        let local = BackendClient {
            app_id: APP_ID,
            queue: Mutex::new(VecDeque::new()),
        };
        for i in 0..(MAX_QUEUED_EVENTS + 25) {
            local.track("event", serde_json::json!({ "i": i }));
        }
        assert_eq!(local.queued(), MAX_QUEUED_EVENTS as u32);
    }

    #[test]
    fn test_track_records_name_and_time() {
        let local = BackendClient {
            app_id: APP_ID,
            queue: Mutex::new(VecDeque::new()),
        };
        local.track("app_launched", serde_json::json!({ "args": 0 }));
        let q = local.queue.lock().unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].name, "app_launched");
        assert!(q[0].at > 0);
    }
}
