//! Authentication backend for axum-login.
//!
//! Credentials resolve through the domain's identity rules, so an unknown
//! email registers a new account on first login.

use axum_login::{AuthUser, AuthnBackend};
use std::fmt;
use std::sync::Arc;

use crate::domain::error::MarketError;
use crate::domain::identity::{self, Credentials};
use crate::domain::user::{User, UserId};
use crate::ports::store_port::StorePort;

use super::blocking;

pub type AuthSession = axum_login::AuthSession<Backend>;

/// The logged-in user held in the session.
#[derive(Clone)]
pub struct SessionUser {
    pub user: User,
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUser")
            .field("id", &self.user.id)
            .field("email", &self.user.email)
            .finish()
    }
}

impl AuthUser for SessionUser {
    type Id = i64;

    fn id(&self) -> i64 {
        self.user.id.0
    }

    // A password change invalidates existing sessions.
    fn session_auth_hash(&self) -> &[u8] {
        self.user.password_hash.as_bytes()
    }
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn StorePort + Send + Sync>,
}

impl Backend {
    pub fn new(store: Arc<dyn StorePort + Send + Sync>) -> Self {
        Self { store }
    }
}

impl AuthnBackend for Backend {
    type User = SessionUser;
    type Credentials = Credentials;
    type Error = MarketError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let store = Arc::clone(&self.store);
        let user = blocking(move || identity::authenticate(store.as_ref(), &creds)).await?;
        Ok(user.map(|user| SessionUser { user }))
    }

    async fn get_user(&self, user_id: &i64) -> Result<Option<Self::User>, Self::Error> {
        let store = Arc::clone(&self.store);
        let id = UserId(*user_id);
        let user = blocking(move || store.find_user(id)).await?;
        Ok(user.map(|user| SessionUser { user }))
    }
}
