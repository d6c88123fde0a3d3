//! Credential handling behind the login boundary.
//!
//! The first successful login with an unknown email registers that user.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;

use crate::domain::error::MarketError;
use crate::domain::user::{NewUser, Principal, User};
use crate::ports::store_port::StorePort;

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, MarketError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| MarketError::Internal {
            reason: format!("password hashing failed: {e}"),
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Resolve credentials to a user, registering unknown emails.
///
/// `Ok(None)` means the email is known and the password is wrong.
pub fn authenticate(
    store: &dyn StorePort,
    credentials: &Credentials,
) -> Result<Option<User>, MarketError> {
    let email = normalize_email(&credentials.email);
    if email.is_empty() || credentials.password.is_empty() {
        return Err(MarketError::invalid_argument(
            "please provide both email and password",
        ));
    }

    if let Some(user) = store.find_user_by_email(&email)? {
        return Ok(check_password(user, &credentials.password));
    }

    let registered = store.insert_user(&NewUser {
        email: email.clone(),
        password_hash: hash_password(&credentials.password)?,
    });
    match registered {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(Some(user))
        }
        // Someone registered the same email in the meantime.
        Err(MarketError::InvalidState { .. }) => match store.find_user_by_email(&email)? {
            Some(user) => Ok(check_password(user, &credentials.password)),
            None => Err(MarketError::Internal {
                reason: "user vanished after duplicate registration".into(),
            }),
        },
        Err(e) => Err(e),
    }
}

fn check_password(user: User, password: &str) -> Option<User> {
    if verify_password(password, &user.password_hash) {
        return Some(user);
    }
    tracing::debug!(user_id = %user.id, "password mismatch");
    None
}

pub fn principal(store: &dyn StorePort, user: &User) -> Result<Principal, MarketError> {
    Ok(Principal {
        user_id: user.id,
        email: user.email.clone(),
        has_team: store.squad_for_user(user.id)?.is_some(),
    })
}
