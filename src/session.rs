//! Session and role resolution.
//!
//! `SessionResolver` turns a verified `Identity` into a `Session`: the
//! profile row (created on first login) and the capability flags derived from
//! its role. The HTTP layer runs it once per request through the `AuthUser`
//! extractor. Long-lived clients use `SessionContext` instead. It is the
//! single writer of the current session state and hands out read-only
//! `SessionView`s.

use chrono::Utc;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::{
    identity::{AuthError, Identity, IdentityState},
    models::{Capabilities, Profile, Role, SessionResponse},
    repository::{ListingScope, RepositoryState},
};

/// Session
///
/// A resolved, signed-in session. `degraded` means the profile shown is a
/// local stand-in with the default role, because the profile table could not
/// be read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub profile: Profile,
    pub capabilities: Capabilities,
    pub degraded: bool,
}

impl Session {
    fn new(profile: Profile, degraded: bool) -> Self {
        Self {
            capabilities: profile.capabilities(),
            profile,
            degraded,
        }
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Which listings this session may manage.
    pub fn listing_scope(&self) -> ListingScope {
        if self.capabilities.is_admin {
            ListingScope::All
        } else {
            ListingScope::OwnedBy(self.profile.id)
        }
    }

    pub fn response(&self) -> SessionResponse {
        SessionResponse {
            profile: Some(self.profile.clone()),
            capabilities: self.capabilities,
            degraded: self.degraded,
        }
    }
}

/// SessionResolver
///
/// Lookup-then-create: an unseen identity gets a `user` profile, a known one
/// is only read. Backend failures never block. They are logged and produce a
/// degraded default-role session.
#[derive(Clone)]
pub struct SessionResolver {
    repo: RepositoryState,
}

impl SessionResolver {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn resolve(&self, identity: &Identity) -> Session {
        match self.repo.get_profile(identity.id).await {
            Ok(Some(profile)) => Session::new(profile, false),
            Ok(None) => match self.repo.create_profile(identity.new_profile()).await {
                Ok(profile) => {
                    tracing::info!(profile_id = %profile.id, "created profile on first login");
                    Session::new(profile, false)
                }
                Err(e) => {
                    tracing::error!(operation = "create_profile", profile_id = %identity.id, error = %e, "profile creation failed");
                    Self::degraded(identity)
                }
            },
            Err(e) => {
                tracing::error!(operation = "get_profile", profile_id = %identity.id, error = %e, "profile lookup failed");
                Self::degraded(identity)
            }
        }
    }

    /// Local stand-in. Nothing is persisted.
    fn degraded(identity: &Identity) -> Session {
        let profile = Profile {
            id: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            avatar_url: Some(identity.avatar_url.clone()),
            role: Role::User,
            created_at: Utc::now(),
        };
        Session::new(profile, true)
    }
}

/// SessionState
///
/// What a `SessionView` observes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Not resolved yet: before `initialize`, or while a transition is in flight.
    #[default]
    Loading,
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(session) => Some(&session.profile),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            SessionState::Authenticated(session) => session.capabilities,
            _ => Capabilities::anonymous(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// AuthStateChange
///
/// Notifications from the identity provider, mirroring its sign-in,
/// token-refresh and sign-out events.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStateChange {
    SignedIn { access_token: String },
    TokenRefreshed { access_token: String },
    SignedOut,
}

/// SessionView
///
/// Read-only projection of the session state. Cheap to clone; every clone
/// sees the same updates.
#[derive(Clone)]
pub struct SessionView {
    rx: watch::Receiver<SessionState>,
}

impl SessionView {
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.rx.borrow().capabilities()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.rx.borrow().profile().cloned()
    }

    /// Waits for the next published state. Returns `false` once the owning
    /// context has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// SessionContext
///
/// The only writer of session state for a client. It runs `initialize` on
/// mount and `apply` for each auth-state change, and publishes each result
/// to every `SessionView`.
pub struct SessionContext {
    resolver: SessionResolver,
    identity: IdentityState,
    state: watch::Sender<SessionState>,
    access_token: Mutex<Option<String>>,
}

impl SessionContext {
    pub fn new(repo: RepositoryState, identity: IdentityState) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            resolver: SessionResolver::new(repo),
            identity,
            state,
            access_token: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> SessionView {
        SessionView {
            rx: self.state.subscribe(),
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.access_token.lock() {
            *slot = token;
        }
    }

    fn token(&self) -> Option<String> {
        self.access_token.lock().ok().and_then(|slot| slot.clone())
    }

    /// Resolves the session for an existing token, if any. An authentication
    /// error leaves the session anonymous and is returned so the caller can
    /// alert.
    pub async fn initialize(&self, access_token: Option<String>) -> Result<(), AuthError> {
        match access_token {
            Some(token) => self.sign_in(token).await,
            None => {
                self.set_token(None);
                self.publish(SessionState::Anonymous);
                Ok(())
            }
        }
    }

    pub async fn apply(&self, change: AuthStateChange) -> Result<(), AuthError> {
        match change {
            AuthStateChange::SignedIn { access_token }
            | AuthStateChange::TokenRefreshed { access_token } => self.sign_in(access_token).await,
            AuthStateChange::SignedOut => {
                self.set_token(None);
                self.publish(SessionState::Anonymous);
                Ok(())
            }
        }
    }

    async fn sign_in(&self, access_token: String) -> Result<(), AuthError> {
        self.publish(SessionState::Loading);
        match self.identity.current_identity(&access_token).await {
            Ok(Some(identity)) => {
                let session = self.resolver.resolve(&identity).await;
                self.set_token(Some(access_token));
                self.publish(SessionState::Authenticated(session));
                Ok(())
            }
            Ok(None) => {
                self.set_token(None);
                self.publish(SessionState::Anonymous);
                Ok(())
            }
            Err(e) => {
                tracing::error!(operation = "current_identity", error = %e, "could not resolve identity");
                self.set_token(None);
                self.publish(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    /// Revokes the remote session, then clears local state whether or not
    /// the revocation succeeded.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = match self.token() {
            Some(token) => self.identity.sign_out(&token).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!(operation = "sign_out", error = %e, "remote sign-out failed");
        }
        self.set_token(None);
        self.publish(SessionState::Anonymous);
        result
    }
}
