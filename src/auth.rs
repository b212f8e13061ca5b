use crate::session_store::{self, SessionRecord};
use crate::types::*;
use base64::Engine;
use once_cell::sync::Lazy;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use std::sync::Mutex;
use url::Url;

pub const REDIRECT_SCHEME: &str = "skybridge";
const REDIRECT_HOST: &str = "auth";
const REDIRECT_PATH: &str = "/callback";

const AUTHORIZE_ENDPOINT: &str = "https://id.skybridge.dev/oauth2/authorize";
const CLIENT_ID: &str = "skybridge-shell";
const SCOPES: &str = "openid email profile";

// An interactive flow left open this long is abandoned
const FLOW_TTL_MS: i64 = 10 * 60 * 1000;

/// Parameters extracted from an inbound auth callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRedirect {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Payload forwarded to the frontend once a redirect has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RedirectEvent {
    pub code: Option<String>,
    pub error: Option<String>,
}

struct PendingFlow {
    state: String,
    started_at_ms: i64,
}

static PENDING: Lazy<Mutex<Option<PendingFlow>>> = Lazy::new(|| Mutex::new(None));

fn redirect_uri() -> String {
    format!("{REDIRECT_SCHEME}://{REDIRECT_HOST}{REDIRECT_PATH}")
}

fn new_state_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Best-effort reconstruction of the previous sign-in. Never talks to the
/// identity provider; the stored record either stands on its own or the
/// restore fails.
pub async fn restore_previous_sign_in() -> SbResult<Option<SessionUser>> {
    restore_with(crate::settings::get().restore_session_on_launch)
}

fn restore_with(enabled: bool) -> SbResult<Option<SessionUser>> {
    if !enabled {
        crate::logger::debug("auth", "session restore disabled in settings");
        return Ok(None);
    }
    restore_from(session_store::load()?)
}

fn restore_from(record: Option<SessionRecord>) -> SbResult<Option<SessionUser>> {
    let Some(record) = record else {
        return Ok(None);
    };
    if is_expired(&record) {
        // an expired session is a failed restore, not an absent one
        return Err(SbError::new(
            ErrorKind::SessionExpired,
            "stored session has expired",
        ));
    }
    Ok(Some(record.user))
}

fn is_expired(record: &SessionRecord) -> bool {
    matches!(record.expires_at_ms, Some(t) if t <= now_ms())
}

pub fn current_user() -> SbResult<Option<SessionUser>> {
    match session_store::load()? {
        Some(r) if !is_expired(&r) => Ok(Some(r.user)),
        _ => Ok(None),
    }
}

/// Opens an interactive flow and hands back the authorization URL the
/// frontend should send the user to. The provider redirects into
/// `skybridge://auth/callback`, which arrives through the URL-open path.
pub fn begin_sign_in() -> SbResult<String> {
    let state = new_state_nonce();
    {
        let mut g = PENDING.lock().unwrap_or_else(|p| p.into_inner());
        *g = Some(PendingFlow {
            state: state.clone(),
            started_at_ms: now_ms(),
        });
    }
    let mut url = Url::parse(AUTHORIZE_ENDPOINT)
        .map_err(|e| err_config(format!("authorize endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", CLIENT_ID)
        .append_pair("redirect_uri", &redirect_uri())
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPES)
        .append_pair("state", &state);
    crate::logger::info("auth", "interactive sign-in started");
    Ok(url.to_string())
}

/// Persists the session the frontend obtained from the provider exchange.
pub fn complete_sign_in(user: SessionUser, expires_at_ms: Option<i64>) -> SbResult<()> {
    let record = SessionRecord {
        user,
        issued_at_ms: now_ms(),
        expires_at_ms,
    };
    session_store::store(&record)?;
    crate::logger::info(
        "auth",
        &format!("session stored for {}", record.user.user_id),
    );
    Ok(())
}

pub fn sign_out() -> SbResult<()> {
    session_store::clear()?;
    let mut g = PENDING.lock().unwrap_or_else(|p| p.into_inner());
    *g = None;
    crate::logger::info("auth", "signed out, session cleared");
    Ok(())
}

/// Recognition only: does this URL have the shape of our auth callback?
pub fn parse_redirect(raw: &str) -> Option<AuthRedirect> {
    let url = Url::parse(raw).ok()?;
    if url.scheme() != REDIRECT_SCHEME {
        return None;
    }
    if url.host_str() != Some(REDIRECT_HOST) || url.path() != REDIRECT_PATH {
        return None;
    }
    let mut out = AuthRedirect {
        code: None,
        state: None,
        error: None,
    };
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => out.code = Some(v.into_owned()),
            "state" => out.state = Some(v.into_owned()),
            "error" => out.error = Some(v.into_owned()),
            _ => {}
        }
    }
    Some(out)
}

fn take_pending_state() -> Option<String> {
    let mut g = PENDING.lock().unwrap_or_else(|p| p.into_inner());
    let flow = g.take()?;
    if now_ms() - flow.started_at_ms > FLOW_TTL_MS {
        return None;
    }
    Some(flow.state)
}

pub(crate) fn evaluate_redirect(
    redirect: &AuthRedirect,
    expected_state: Option<&str>,
) -> RedirectEvent {
    if let Some(e) = &redirect.error {
        return RedirectEvent {
            code: None,
            error: Some(e.clone()),
        };
    }
    let state_ok = matches!(
        (expected_state, redirect.state.as_deref()),
        (Some(exp), Some(got)) if exp == got
    );
    if !state_ok {
        return RedirectEvent {
            code: None,
            error: Some("state_mismatch".into()),
        };
    }
    match &redirect.code {
        Some(code) => RedirectEvent {
            code: Some(code.clone()),
            error: None,
        },
        None => RedirectEvent {
            code: None,
            error: Some("missing_code".into()),
        },
    }
}

/// The sign-in library's URL handler: returns true when the URL is ours,
/// whatever the outcome of consuming it. Anything else is for the caller.
pub fn handle_redirect(app: &tauri::AppHandle, raw: &str) -> bool {
    let Some(redirect) = parse_redirect(raw) else {
        return false;
    };
    let expected = take_pending_state();
    let event = evaluate_redirect(&redirect, expected.as_deref());
    match &event.error {
        None => crate::logger::info("auth", "sign-in redirect accepted"),
        Some(reason) => {
            crate::logger::warn("auth", &format!("sign-in redirect rejected: {reason}"))
        }
    }
    use tauri::Emitter;
    let _ = app.emit("sb://auth_redirect", event);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            user_id: "u-1".into(),
            email: Some("person@example.com".into()),
            display_name: None,
        }
    }

    #[test]
    fn test_parse_redirect_extracts_params() {
        let r = parse_redirect("skybridge://auth/callback?code=abc&state=xyz").unwrap();
        assert_eq!(r.code.as_deref(), Some("abc"));
        assert_eq!(r.state.as_deref(), Some("xyz"));
        assert!(r.error.is_none());
    }

    #[test]
    fn test_parse_redirect_provider_error() {
        let r = parse_redirect("skybridge://auth/callback?error=access_denied").unwrap();
        assert_eq!(r.error.as_deref(), Some("access_denied"));
        assert!(r.code.is_none());
    }

    #[test]
    fn test_parse_redirect_rejects_foreign_urls() {
        assert!(parse_redirect("https://auth/callback?code=abc").is_none());
        assert!(parse_redirect("skybridge://settings/callback").is_none());
        assert!(parse_redirect("skybridge://auth/other").is_none());
        assert!(parse_redirect("not a url").is_none());
    }

    #[test]
    fn test_parse_redirect_without_query() {
        let r = parse_redirect("skybridge://auth/callback").unwrap();
        assert!(r.code.is_none() && r.state.is_none() && r.error.is_none());
    }

    #[test]
    fn test_evaluate_accepts_matching_state() {
        let r = AuthRedirect {
            code: Some("abc".into()),
            state: Some("xyz".into()),
            error: None,
        };
        let ev = evaluate_redirect(&r, Some("xyz"));
        assert_eq!(ev.code.as_deref(), Some("abc"));
        assert!(ev.error.is_none());
    }

    #[test]
    fn test_evaluate_rejects_state_mismatch() {
        let r = AuthRedirect {
            code: Some("abc".into()),
            state: Some("xyz".into()),
            error: None,
        };
        assert_eq!(
            evaluate_redirect(&r, Some("other")).error.as_deref(),
            Some("state_mismatch")
        );
        assert_eq!(
            evaluate_redirect(&r, None).error.as_deref(),
            Some("state_mismatch")
        );
    }

    #[test]
    fn test_evaluate_passes_provider_error_through() {
        let r = AuthRedirect {
            code: None,
            state: Some("xyz".into()),
            error: Some("access_denied".into()),
        };
        let ev = evaluate_redirect(&r, Some("xyz"));
        assert_eq!(ev.error.as_deref(), Some("access_denied"));
        assert!(ev.code.is_none());
    }

    #[test]
    fn test_evaluate_requires_code() {
        let r = AuthRedirect {
            code: None,
            state: Some("xyz".into()),
            error: None,
        };
        assert_eq!(
            evaluate_redirect(&r, Some("xyz")).error.as_deref(),
            Some("missing_code")
        );
    }

    #[test]
    fn test_restore_from_absent_record() {
        assert_eq!(restore_from(None).unwrap(), None);
    }

    #[test]
    fn test_restore_from_valid_record() {
        let rec = SessionRecord {
            user: user(),
            issued_at_ms: now_ms(),
            expires_at_ms: Some(now_ms() + 60_000),
        };
        let restored = restore_from(Some(rec)).unwrap().unwrap();
        assert_eq!(restored.user_id, "u-1");
    }

    #[test]
    fn test_restore_from_record_without_expiry() {
        let rec = SessionRecord {
            user: user(),
            issued_at_ms: now_ms(),
            expires_at_ms: None,
        };
        assert!(restore_from(Some(rec)).unwrap().is_some());
    }

    #[test]
    fn test_restore_disabled_reports_no_session_without_reading_disk() {
        // returns before the store is consulted, so no data dir is needed
        assert!(restore_with(false).unwrap().is_none());
    }

    #[test]
    fn test_restore_from_expired_record_is_an_error() {
        let rec = SessionRecord {
            user: user(),
            issued_at_ms: now_ms() - 120_000,
            expires_at_ms: Some(now_ms() - 60_000),
        };
        let err = restore_from(Some(rec)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionExpired);
    }

    // PENDING is process-wide, so the whole flow lifecycle stays in one test.
    #[test]
    fn test_pending_flow_lifecycle() {
        let url = begin_sign_in().unwrap();
        assert!(url.starts_with(AUTHORIZE_ENDPOINT));
        assert!(url.contains("redirect_uri=skybridge%3A%2F%2Fauth%2Fcallback"));

        let parsed = Url::parse(&url).unwrap();
        let state = parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        assert_eq!(take_pending_state().as_deref(), Some(state.as_str()));
        // consumed: a second take finds nothing
        assert!(take_pending_state().is_none());

        // a stale flow is not honored
        {
            let mut g = PENDING.lock().unwrap();
            *g = Some(PendingFlow {
                state: "old".into(),
                started_at_ms: now_ms() - FLOW_TTL_MS - 1,
            });
        }
        assert!(take_pending_state().is_none());
    }

    #[tokio::test]
    async fn test_restore_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("SKYBRIDGE_DATA_DIR", dir.path());

        complete_sign_in(user(), Some(now_ms() + 60_000)).unwrap();
        let restored = restore_previous_sign_in().await.unwrap().unwrap();
        assert_eq!(restored.email.as_deref(), Some("person@example.com"));

        // clear the record only; sign_out would also drop any pending flow
        // another test may have opened
        session_store::clear().unwrap();
        assert!(restore_previous_sign_in().await.unwrap().is_none());

        std::env::remove_var("SKYBRIDGE_DATA_DIR");
    }
}
