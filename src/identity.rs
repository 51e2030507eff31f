use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    models::{NewProfile, Role},
};

/// Identity
///
/// The externally authenticated principal, independent of any application
/// data. Always derived from a signature-verified token or from the auth
/// server itself, never from client-decoded claims.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
}

/// UserMetadata
///
/// The subset of `user_metadata` the Google provider fills in. Both naming
/// schemes show up depending on how the identity was linked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub picture: Option<String>,
}

impl Identity {
    /// Applies the display fallbacks: the name falls back to the email, the
    /// avatar to a generated initials image.
    pub fn from_parts(id: Uuid, email: Option<String>, metadata: &UserMetadata) -> Self {
        let email = email.unwrap_or_default();
        let name = metadata
            .full_name
            .clone()
            .or_else(|| metadata.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        let avatar_url = metadata
            .avatar_url
            .clone()
            .or_else(|| metadata.picture.clone())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("https://ui-avatars.com/api/?name={email}"));
        Self {
            id,
            email,
            name,
            avatar_url,
        }
    }

    /// The profile row created on first login. New profiles always start as `user`.
    pub fn new_profile(&self) -> NewProfile {
        NewProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: Some(self.avatar_url.clone()),
            role: Role::User,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth provider is not configured (SUPABASE_URL / SUPABASE_ANON_KEY missing)")]
    NotConfigured,

    #[error("auth provider unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// IdentityProvider
///
/// Boundary to the hosted auth service: start the Google sign-in, look up the
/// identity behind an access token, and revoke a session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to in order to sign in with Google. `None`
    /// when the platform URL is not configured.
    fn authorize_url(&self, redirect_to: &str) -> Option<String>;

    /// `Ok(None)` when the token is no longer valid (signed out or expired).
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

pub type IdentityState = Arc<dyn IdentityProvider>;

#[derive(Deserialize)]
struct AuthUserResponse {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

/// SupabaseAuthClient
///
/// `IdentityProvider` over the platform's `/auth/v1` REST endpoints.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    auth_url: Option<String>,
    anon_key: Option<String>,
}

impl SupabaseAuthClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: config.auth_url(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<(String, &str), AuthError> {
        match (&self.auth_url, &self.anon_key) {
            (Some(base), Some(key)) => Ok((format!("{base}{path}"), key.as_str())),
            _ => Err(AuthError::NotConfigured),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    fn authorize_url(&self, redirect_to: &str) -> Option<String> {
        let base = self.auth_url.as_ref()?;
        reqwest::Url::parse_with_params(
            &format!("{base}/authorize"),
            &[("provider", "google"), ("redirect_to", redirect_to)],
        )
        .map(|url| url.to_string())
        .map_err(|e| tracing::error!(error = %e, "could not build authorize url"))
        .ok()
    }

    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, AuthError> {
        let (url, key) = self.endpoint("/user")?;
        let response = self
            .http
            .get(url)
            .header("apikey", key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user = response.json::<AuthUserResponse>().await?;
                Ok(Some(Identity::from_parts(
                    user.id,
                    user.email,
                    &user.user_metadata,
                )))
            }
            status => Err(AuthError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let (url, key) = self.endpoint("/logout")?;
        let response = self
            .http
            .post(url)
            .header("apikey", key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        // An already-invalid token means the session is gone, which is what we wanted.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(AuthError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}
