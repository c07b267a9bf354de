//! Session state and the authenticated request executor.

use reqwest::header::{self, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::store::{CredentialStore, KEY_TOKEN, KEY_USER};
use crate::config::{LOGIN_PATH, REGISTER_PATH};
use crate::models::User;

/// Why a login or registration attempt did not produce a session.
///
/// Every failure path of the auth endpoints maps onto one of these
/// variants; nothing escapes as a panic or a raw transport error.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Server error occurred")]
    Server,

    #[error("{0}")]
    Rejected(String),

    #[error("Network error occurred")]
    Network(#[source] reqwest::Error),

    #[error("Failed to persist session: {0}")]
    Storage(anyhow::Error),
}

/// Registration input. A missing username is synthesized from the email
/// local-part, which the API requires.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: String,
    pub password: String,
}

impl NewUser {
    fn effective_username(&self) -> String {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: User,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Owns the in-memory session and keeps it synchronized with the
/// persistent credential store.
///
/// Invariant: `token` and `user` are set and cleared together, so
/// `is_authenticated()` is never observable in a half-updated state.
pub struct SessionManager {
    client: reqwest::Client,
    base_url: String,
    store: Box<dyn CredentialStore>,
    token: Option<String>,
    user: Option<User>,
    loading: bool,
}

impl SessionManager {
    /// Create a session manager with no active session. Call `restore()`
    /// to pick up a session persisted by a previous run.
    pub fn new(
        base_url: impl Into<String>,
        store: Box<dyn CredentialStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            token: None,
            user: None,
            loading: true,
        })
    }

    /// The shared HTTP client. Clone is cheap - reqwest uses Arc
    /// internally for connection pooling.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// True only during initial restoration from the credential store.
    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Restore a persisted session from the credential store.
    ///
    /// Activates the session only when both the token and the profile are
    /// present and parseable; any storage or parse failure is treated as
    /// "no session". Always terminates and clears `loading`.
    pub fn restore(&mut self) {
        if let Some((token, user)) = self.read_stored() {
            debug!(user = %user.display_name(), "Restored session from storage");
            self.token = Some(token);
            self.user = Some(user);
        }
        self.loading = false;
    }

    fn read_stored(&self) -> Option<(String, User)> {
        let token = match self.store.get(KEY_TOKEN) {
            Ok(value) => value?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return None;
            }
        };
        let raw_user = match self.store.get(KEY_USER) {
            Ok(value) => value?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user profile");
                return None;
            }
        };
        match serde_json::from_str(&raw_user) {
            Ok(user) => Some((token, user)),
            Err(e) => {
                warn!(error = %e, "Stored user profile is malformed");
                None
            }
        }
    }

    /// Authenticate against `POST /api/auth/login`.
    ///
    /// On success the token and profile are persisted and the session
    /// activated; the optional server message is returned for display.
    pub async fn login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<Option<String>, AuthError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let body = serde_json::json!({ "email": email, "password": password });
        self.authenticate(&url, &body, "Login failed").await
    }

    /// Create an account against `POST /api/auth/register` and log in
    /// with it (the API returns a session on successful registration).
    pub async fn register(&mut self, new_user: &NewUser) -> Result<Option<String>, AuthError> {
        let url = format!("{}{}", self.base_url, REGISTER_PATH);
        let body = serde_json::json!({
            "username": new_user.effective_username(),
            "email": new_user.email,
            "password": new_user.password,
        });
        self.authenticate(&url, &body, "Registration failed").await
    }

    async fn authenticate(
        &mut self,
        url: &str,
        body: &serde_json::Value,
        fallback: &str,
    ) -> Result<Option<String>, AuthError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        let text = response.text().await.map_err(AuthError::Network)?;

        if !status.is_success() {
            return Err(Self::classify_failure(status, &text, fallback));
        }

        let auth: AuthResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::Rejected(format!("Malformed auth response: {}", e)))?;
        self.activate(auth.token, auth.user)?;
        Ok(auth.message)
    }

    fn classify_failure(status: StatusCode, body: &str, fallback: &str) -> AuthError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .unwrap_or_default()
            .message;
        match status.as_u16() {
            401 => AuthError::InvalidCredentials,
            400 => AuthError::Validation(
                message.unwrap_or_else(|| "Validation error".to_string()),
            ),
            500..=599 => AuthError::Server,
            _ => AuthError::Rejected(message.unwrap_or_else(|| fallback.to_string())),
        }
    }

    /// Persist and activate a session. The in-memory state changes only
    /// after both writes succeed, so a storage failure never leaves a
    /// session that would vanish on restart.
    fn activate(&mut self, token: String, user: User) -> Result<(), AuthError> {
        self.store
            .put(KEY_TOKEN, &token)
            .map_err(AuthError::Storage)?;
        let raw_user = serde_json::to_string(&user)
            .map_err(|e| AuthError::Storage(anyhow::Error::new(e)))?;
        self.store
            .put(KEY_USER, &raw_user)
            .map_err(AuthError::Storage)?;
        self.token = Some(token);
        self.user = Some(user);
        Ok(())
    }

    /// Clear the persisted and in-memory session unconditionally.
    ///
    /// Idempotent and infallible: storage errors are logged and
    /// swallowed, the in-memory state is cleared regardless.
    pub fn logout(&mut self) {
        for key in [KEY_TOKEN, KEY_USER] {
            if let Err(e) = self.store.delete(key) {
                warn!(key, error = %e, "Failed to clear stored credential");
            }
        }
        self.token = None;
        self.user = None;
    }

    /// Execute a request with the session's authorization attached.
    ///
    /// Inserts `Content-Type: application/json` and the bearer token only
    /// when the caller did not already set those headers. Single attempt,
    /// no retry, no token refresh. A 401 response clears the session as a
    /// side effect and is then returned to the caller unmodified.
    pub async fn auth_fetch(
        &mut self,
        builder: reqwest::RequestBuilder,
    ) -> reqwest::Result<reqwest::Response> {
        let mut request = builder.build()?;
        let headers = request.headers_mut();

        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        if let Some(token) = &self.token {
            if !headers.contains_key(header::AUTHORIZATION) {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(value) => {
                        headers.insert(header::AUTHORIZATION, value);
                    }
                    Err(e) => warn!(error = %e, "Token not usable as a header value"),
                }
            }
        }

        let response = self.client.execute(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Request returned 401, clearing session");
            self.logout();
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;

    fn manager_with_store(store: MemoryCredentialStore) -> SessionManager {
        SessionManager::new("http://localhost:3000", Box::new(store)).unwrap()
    }

    #[test]
    fn restore_with_empty_store_clears_loading() {
        let mut session = manager_with_store(MemoryCredentialStore::new());
        assert!(session.loading());
        session.restore();
        assert!(!session.loading());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn restore_activates_session_when_both_entries_present() {
        let store = MemoryCredentialStore::new();
        store.put(KEY_TOKEN, "tok-abc").unwrap();
        store
            .put(KEY_USER, r#"{"id":"u1","username":"somchai"}"#)
            .unwrap();

        let mut session = manager_with_store(store);
        session.restore();
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok-abc"));
        assert_eq!(session.user().unwrap().id, "u1");
    }

    #[test]
    fn restore_treats_token_without_profile_as_no_session() {
        let store = MemoryCredentialStore::new();
        store.put(KEY_TOKEN, "tok-abc").unwrap();

        let mut session = manager_with_store(store);
        session.restore();
        assert!(!session.is_authenticated());
        assert!(!session.loading());
    }

    #[test]
    fn restore_survives_storage_failure() {
        let store = MemoryCredentialStore::new();
        store.set_failing(true);

        let mut session = manager_with_store(store);
        session.restore();
        assert!(!session.loading());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn logout_is_idempotent_even_when_storage_fails() {
        let store = MemoryCredentialStore::new();
        store.put(KEY_TOKEN, "tok").unwrap();
        store.put(KEY_USER, r#"{"id":"u1"}"#).unwrap();
        store.set_failing(true);

        let mut session = manager_with_store(store);
        session.restore(); // storage failing, so nothing restored
        session.logout();
        assert!(!session.is_authenticated());
        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
    }

    #[test]
    fn username_synthesized_from_email_local_part() {
        let new_user = NewUser {
            username: None,
            email: "somchai@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(new_user.effective_username(), "somchai");

        let explicit = NewUser {
            username: Some("reader".to_string()),
            ..new_user
        };
        assert_eq!(explicit.effective_username(), "reader");
    }

    #[test]
    fn failure_classification_by_status() {
        let err = SessionManager::classify_failure(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"nope"}"#,
            "Login failed",
        );
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = SessionManager::classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"message":"email is required"}"#,
            "Login failed",
        );
        assert!(matches!(err, AuthError::Validation(m) if m == "email is required"));

        let err = SessionManager::classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "",
            "Login failed",
        );
        assert!(matches!(err, AuthError::Server));

        let err =
            SessionManager::classify_failure(StatusCode::IM_A_TEAPOT, "not json", "Login failed");
        assert!(matches!(err, AuthError::Rejected(m) if m == "Login failed"));
    }
}
