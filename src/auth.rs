//! Authentication session management
//!
//! Owns the bearer token lifecycle: login, proactive refresh ahead of
//! expiry, fallback to a full re-login when refresh is unavailable or
//! rejected, and export/import of session state so a process can resume
//! without re-entering credentials.
//!
//! The session sits behind one `tokio::sync::Mutex` that stays held
//! across the login/refresh round-trip, so N concurrent callers racing
//! past an expired token trigger exactly one network call and share its
//! result. The new state is assembled in full before it is stored; a
//! refresh cancelled at the await point leaves the old session intact.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{LoJackError, Result};
use crate::models::{optional_i64, optional_string, parse_timestamp, pick};
use crate::transport::Transport;

/// Exported authentication state for session resumption.
///
/// 持久化这份数据即可在重启后恢复会话，不需要保存密码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthArtifacts {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AuthArtifacts {
    /// Serialize for storage.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Tolerant deserialization: only the access token is required, a
    /// malformed expiry degrades to `None`.
    pub fn from_value(data: &Value) -> Option<Self> {
        let access_token = optional_string(pick(data, &["access_token"]))?;
        Some(AuthArtifacts {
            access_token,
            expires_at: parse_timestamp(pick(data, &["expires_at"])),
            refresh_token: optional_string(pick(data, &["refresh_token"])),
            user_id: optional_string(pick(data, &["user_id"])),
        })
    }
}

/// Token state owned exclusively by one [`AuthManager`].
#[derive(Debug, Clone, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// Absent means the token is valid until the server says otherwise.
    expires_at: Option<DateTime<Utc>>,
    user_id: Option<String>,
}

impl SessionState {
    /// The cached token, unless "now" has entered the refresh margin of
    /// a known expiry.
    fn token_outside_margin(&self, margin: Duration) -> Option<String> {
        let token = self.access_token.clone()?;
        match self.expires_at {
            Some(expires_at) if Utc::now() >= expires_at - margin => None,
            _ => Some(token),
        }
    }

    fn is_authenticated(&self) -> bool {
        if self.access_token.is_none() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => Utc::now() < expires_at,
            None => true,
        }
    }
}

/// Manages authentication tokens for the identity service.
pub struct AuthManager {
    transport: Arc<dyn Transport>,
    username: Option<String>,
    password: Option<Secret<String>>,
    refresh_margin: Duration,
    session: Mutex<SessionState>,
}

impl AuthManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        username: Option<String>,
        password: Option<Secret<String>>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            transport,
            username,
            password,
            refresh_margin,
            session: Mutex::new(SessionState::default()),
        }
    }

    /// True iff a token is held and not past its known expiry.
    ///
    /// Purely local; the server can still reject the token out-of-band
    /// with a 401.
    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_authenticated()
    }

    /// The authenticated user id, when the login response carried one.
    pub async fn user_id(&self) -> Option<String> {
        self.session.lock().await.user_id.clone()
    }

    /// Drop all authentication state.
    pub async fn clear(&self) {
        *self.session.lock().await = SessionState::default();
    }

    /// Export the session for persistence, `None` when no token is held.
    pub async fn export_artifacts(&self) -> Option<AuthArtifacts> {
        let session = self.session.lock().await;
        let access_token = session.access_token.clone()?;
        Some(AuthArtifacts {
            access_token,
            expires_at: session.expires_at,
            refresh_token: session.refresh_token.clone(),
            user_id: session.user_id.clone(),
        })
    }

    /// Restore a previously exported session without contacting the
    /// server.
    pub async fn import_artifacts(&self, artifacts: &AuthArtifacts) {
        let mut session = self.session.lock().await;
        *session = SessionState {
            access_token: Some(artifacts.access_token.clone()),
            refresh_token: artifacts.refresh_token.clone(),
            expires_at: artifacts.expires_at,
            user_id: artifacts.user_id.clone(),
        };
    }

    /// Authenticate with username/password and return the access token.
    pub async fn login(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        self.login_locked(&mut session).await
    }

    /// Refresh the access token, falling back to a full login when no
    /// refresh token is held.
    pub async fn refresh(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        self.refresh_locked(&mut session).await
    }

    /// Return a valid access token, performing login or refresh as
    /// needed. No I/O happens while the cached token is valid.
    pub async fn get_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        if session.access_token.is_none() {
            debug!("No token held, performing initial login");
            return self.login_locked(&mut session).await;
        }
        if let Some(token) = session.token_outside_margin(self.refresh_margin) {
            return Ok(token);
        }

        debug!("Token within refresh margin of expiry, refreshing");
        self.refresh_locked(&mut session).await
    }

    async fn login_locked(&self, session: &mut SessionState) -> Result<String> {
        // 凭据缺失时快速失败，不发请求
        let (username, password) = match (&self.username, &self.password) {
            (Some(u), Some(p)) => (u.clone(), p.expose_secret().clone()),
            _ => {
                return Err(LoJackError::authentication(
                    "username and password are required for login",
                ))
            }
        };

        let payload = json!({ "username": username, "password": password });
        let data = self
            .transport
            .request("POST", "/auth/login", None, Some(payload), None)
            .await
            .map_err(|e| LoJackError::authentication(format!("login failed: {e}")))?;

        let (token, next) = session_from_login(&data)?;
        info!(user_id = next.user_id.as_deref(), "Authenticated with identity service");
        *session = next;
        Ok(token)
    }

    async fn refresh_locked(&self, session: &mut SessionState) -> Result<String> {
        let Some(refresh_token) = session.refresh_token.clone() else {
            debug!("No refresh token held, performing full login");
            return self.login_locked(session).await;
        };

        let payload = json!({ "refresh_token": refresh_token });
        let data = match self
            .transport
            .request("POST", "/auth/refresh", None, Some(payload), None)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_authentication() => {
                // 刷新令牌失效，退回完整登录
                warn!("Refresh token rejected, falling back to full login");
                return self.login_locked(session).await;
            }
            Err(e) => {
                return Err(LoJackError::authentication(format!("token refresh failed: {e}")))
            }
        };

        let token = match optional_string(pick(&data, &["access_token", "token"])) {
            Some(token) => token,
            None => {
                warn!("Refresh response carried no token, falling back to full login");
                return self.login_locked(session).await;
            }
        };

        // 完整装配后一次性写回：刷新在 await 点被取消时旧会话保持有效
        let mut next = session.clone();
        next.access_token = Some(token.clone());
        if let Some(new_refresh) = optional_string(pick(&data, &["refresh_token"])) {
            next.refresh_token = Some(new_refresh);
        }
        if let Some(raw) = pick(&data, &["expires_in", "expiresIn"]) {
            if let Some(secs) = optional_i64(Some(raw)) {
                next.expires_at = Some(Utc::now() + Duration::seconds(secs));
            }
        }
        *session = next;

        info!("Access token refreshed");
        Ok(token)
    }
}

/// Build a complete session from a login response.
fn session_from_login(data: &Value) -> Result<(String, SessionState)> {
    if !data.is_object() {
        return Err(LoJackError::authentication("invalid login response"));
    }

    let token = match optional_string(pick(data, &["access_token", "token"])) {
        Some(token) => token,
        None => {
            let reason = optional_string(pick(data, &["error", "message"]))
                .unwrap_or_else(|| "no token in response".to_string());
            return Err(LoJackError::authentication(format!("login failed: {reason}")));
        }
    };

    let state = SessionState {
        access_token: Some(token.clone()),
        refresh_token: optional_string(pick(data, &["refresh_token"])),
        expires_at: expiry_from_response(data),
        user_id: optional_string(pick(data, &["user_id", "userId"])),
    };
    Ok((token, state))
}

/// Expiry from a login/refresh response.
///
/// `expires_in` (seconds from now) takes precedence over an absolute
/// `expires_at`; when both are present the relative one wins. A present
/// but unparseable `expires_in` yields no expiry rather than falling
/// through to the absolute field.
fn expiry_from_response(data: &Value) -> Option<DateTime<Utc>> {
    if let Some(raw) = pick(data, &["expires_in", "expiresIn"]) {
        return optional_i64(Some(raw)).map(|secs| Utc::now() + Duration::seconds(secs));
    }
    parse_timestamp(pick(data, &["expires_at", "expiresAt"]))
}
