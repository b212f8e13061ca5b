use crate::backend::BackendStatus;
use crate::types::*;

/// Session state as the frontend sees it.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub signed_in: bool,
    pub user: Option<SessionUser>,
}

#[tauri::command]
pub async fn auth_status() -> SbResult<AuthStatus> {
    let r = crate::auth::current_user();
    match &r {
        Ok(Some(u)) => {
            crate::logger::debug("bridge", &format!("auth_status signed in as {}", u.user_id))
        }
        Ok(None) => crate::logger::debug("bridge", "auth_status signed out"),
        Err(e) => crate::logger::error("bridge", &format!("auth_status err: {}", e.message)),
    }
    r.map(|user| AuthStatus {
        signed_in: user.is_some(),
        user,
    })
}

#[tauri::command]
pub async fn auth_begin_sign_in() -> SbResult<String> {
    let r = crate::auth::begin_sign_in();
    match &r {
        Ok(_) => crate::logger::info("bridge", "auth_begin_sign_in ok"),
        Err(e) => {
            crate::logger::error("bridge", &format!("auth_begin_sign_in err: {}", e.message))
        }
    }
    r
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSignInParams {
    pub user: SessionUser,
    pub expires_at_ms: Option<i64>,
}

#[tauri::command]
pub async fn auth_complete_sign_in(params: CompleteSignInParams) -> SbResult<()> {
    let r = crate::auth::complete_sign_in(params.user, params.expires_at_ms);
    match &r {
        Ok(_) => crate::logger::info("bridge", "auth_complete_sign_in ok"),
        Err(e) => crate::logger::error(
            "bridge",
            &format!("auth_complete_sign_in err: {}", e.message),
        ),
    }
    r
}

#[tauri::command]
pub async fn auth_sign_out() -> SbResult<()> {
    let r = crate::auth::sign_out();
    match &r {
        Ok(_) => crate::logger::info("bridge", "auth_sign_out ok"),
        Err(e) => crate::logger::error("bridge", &format!("auth_sign_out err: {}", e.message)),
    }
    r
}

#[tauri::command]
pub async fn backend_status() -> SbResult<BackendStatus> {
    let s = crate::backend::status();
    crate::logger::debug(
        "bridge",
        &format!("backend_status configured={}", s.configured),
    );
    Ok(s)
}
