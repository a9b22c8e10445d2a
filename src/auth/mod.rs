//! Sign-in state for the app. The backend sits behind [`AuthProvider`];
//! [`AuthSession`] owns the "current user" observable the shell listens to.

#[cfg(feature = "app")]
pub mod commands;
pub mod firebase;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use firebase::FirebaseAuth;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub is_guest: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailInUse,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("guest sign-in is disabled for this project")]
    GuestDisabled,
    #[error("{0}")]
    InvalidInput(String),
    #[error("could not reach the auth service: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError>;

    async fn continue_as_guest(&self) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Explicit name, else the local part of the email, else "User".
pub fn display_name_for(display_name: Option<&str>, email: Option<&str>) -> String {
    display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            email
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
        })
        .unwrap_or("User")
        .to_string()
}

#[derive(Clone)]
pub struct AuthSession {
    provider: Arc<dyn AuthProvider>,
    current: Arc<watch::Sender<Option<User>>>,
}

impl AuthSession {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            provider,
            current: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        validate_password(password)?;

        let user = self.provider.sign_in(email, password).await?;
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        validate_password(password)?;
        let display_name = display_name.map(str::trim).filter(|name| !name.is_empty());

        let user = self.provider.sign_up(email, password, display_name).await?;
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    pub async fn continue_as_guest(&self) -> Result<User, AuthError> {
        let user = self.provider.continue_as_guest().await?;
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    /// Clears the local user even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.provider.sign_out().await;
        self.current.send_replace(None);
        result
    }
}

fn validate_email(email: &str) -> Result<&str, AuthError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput("enter a valid email address".into()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}
