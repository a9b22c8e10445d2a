//! Firebase Authentication over the Identity Toolkit REST API.

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Duration;

use super::{display_name_for, AuthError, AuthProvider, User};

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct FirebaseAuth {
    api_key: String,
    base_url: String,
    client: Client,
}

impl FirebaseAuth {
    pub fn new(api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, IDENTITY_TOOLKIT_URL, timeout)
    }

    pub fn with_base_url(api_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<AccountResponse, AuthError> {
        let resp = self
            .client
            .post(format!("{}/accounts:{}", self.base_url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if resp.status().is_success() {
            return resp
                .json::<AccountResponse>()
                .await
                .map_err(|e| AuthError::Other(e.to_string()));
        }

        let status = resp.status();
        match resp.json::<ErrorEnvelope>().await {
            Ok(envelope) => Err(map_error_code(&envelope.error.message)),
            Err(_) => Err(AuthError::Other(format!("HTTP {}", status.as_u16()))),
        }
    }
}

/// Messages look like `WEAK_PASSWORD : Password should be at least 6 characters`.
fn map_error_code(message: &str) -> AuthError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "ADMIN_ONLY_OPERATION" | "OPERATION_NOT_ALLOWED" => AuthError::GuestDisabled,
        _ => AuthError::Other(message.to_string()),
    }
}

fn user_from(account: AccountResponse, is_guest: bool) -> User {
    let display_name = display_name_for(account.display_name.as_deref(), account.email.as_deref());
    User {
        id: account.local_id,
        email: account.email.filter(|e| !e.is_empty()),
        display_name,
        is_guest,
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let account = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(user_from(account, false))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let mut account = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        if let (Some(name), Some(token)) = (display_name, account.id_token.as_deref()) {
            // The account exists once signUp succeeds; a failed profile
            // update only costs the display name.
            match self
                .call(
                    "update",
                    json!({ "idToken": token, "displayName": name, "returnSecureToken": false }),
                )
                .await
            {
                Ok(updated) => {
                    account.display_name = updated.display_name.or_else(|| Some(name.to_string()));
                }
                Err(err) => warn!("display name update failed for {}: {err}", account.local_id),
            }
        }

        Ok(user_from(account, false))
    }

    async fn continue_as_guest(&self) -> Result<User, AuthError> {
        let account = self.call("signUp", json!({ "returnSecureToken": true })).await?;
        Ok(user_from(account, true))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // ID tokens are stateless; nothing to revoke server-side
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, http::Uri, Json, Router};
    use std::collections::HashMap;

    async fn identity_toolkit(
        uri: Uri,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if query.get("key").map(String::as_str) != Some("test-key") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "code": 400, "message": "API_KEY_INVALID" } })),
            );
        }

        let failure = |message: &str| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "code": 400, "message": message } })),
            )
        };

        match uri.path() {
            "/v1/accounts:signInWithPassword" => {
                if body["password"] == "secret1" {
                    (
                        StatusCode::OK,
                        Json(json!({ "localId": "uid-1", "email": body["email"], "idToken": "t1", "displayName": "" })),
                    )
                } else {
                    failure("INVALID_LOGIN_CREDENTIALS")
                }
            }
            "/v1/accounts:signUp" if body.get("email").is_none() => {
                (StatusCode::OK, Json(json!({ "localId": "anon-1", "idToken": "t2" })))
            }
            "/v1/accounts:signUp" => {
                if body["email"] == "taken@pond.io" {
                    failure("EMAIL_EXISTS")
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({ "localId": "uid-2", "email": body["email"], "idToken": "t3" })),
                    )
                }
            }
            "/v1/accounts:update" if body["displayName"] == "Unlucky" => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
            }
            "/v1/accounts:update" => (
                StatusCode::OK,
                Json(json!({ "localId": "uid-2", "displayName": body["displayName"] })),
            ),
            _ => (StatusCode::NOT_FOUND, Json(json!({}))),
        }
    }

    async fn serve() -> FirebaseAuth {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(identity_toolkit))
                .await
                .unwrap();
        });
        FirebaseAuth::with_base_url("test-key", &format!("http://{addr}/v1"), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn error_codes_map_to_variants() {
        assert_eq!(
            map_error_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        );
        assert_eq!(map_error_code("EMAIL_NOT_FOUND"), AuthError::InvalidCredentials);
        assert_eq!(map_error_code("ADMIN_ONLY_OPERATION"), AuthError::GuestDisabled);
        assert_eq!(
            map_error_code("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::Other("TOO_MANY_ATTEMPTS_TRY_LATER".into())
        );
    }

    #[tokio::test]
    async fn sign_in_uses_email_local_part_when_name_blank() {
        let auth = serve().await;
        let user = auth.sign_in("farmer@pond.io", "secret1").await.unwrap();
        assert_eq!(user.id, "uid-1");
        assert_eq!(user.display_name, "farmer");
        assert!(!user.is_guest);

        assert_eq!(
            auth.sign_in("farmer@pond.io", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn sign_up_sets_display_name_and_reports_duplicates() {
        let auth = serve().await;
        let user = auth.sign_up("new@pond.io", "secret1", Some("Ana")).await.unwrap();
        assert_eq!(user.display_name, "Ana");

        assert_eq!(
            auth.sign_up("taken@pond.io", "secret1", None).await,
            Err(AuthError::EmailInUse)
        );
    }

    #[tokio::test]
    async fn failed_profile_update_still_returns_created_account() {
        let auth = serve().await;
        let user = auth
            .sign_up("unlucky@pond.io", "secret1", Some("Unlucky"))
            .await
            .unwrap();
        assert_eq!(user.id, "uid-2");
        assert_eq!(user.display_name, "unlucky");
    }

    #[tokio::test]
    async fn guest_account_is_anonymous() {
        let auth = serve().await;
        let user = auth.continue_as_guest().await.unwrap();
        assert!(user.is_guest);
        assert_eq!(user.email, None);
        assert_eq!(user.display_name, "User");
    }
}
