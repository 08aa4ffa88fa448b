use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::ServiceError;
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

/// Claims signed by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ServiceError> {
        if !action.authenticate(self) {
            return Err(ServiceError::permission_denied());
        }
        Ok(())
    }

    /// Owners pass with `own`, everybody else needs `all`.
    pub fn authenticate_owner(
        &self,
        owner_id: Id,
        own: ActionType,
        all: ActionType,
    ) -> Result<(), ServiceError> {
        self.authenticate(own)?;

        if owner_id == self.user_id || self.authenticate(all).is_ok() {
            return Ok(());
        }
        Err(ServiceError::permission_denied())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

pub fn session_key(secret: &str) -> Result<Hmac<Sha256>, ServiceError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| {
        log::error!("Invalid session signing key");
        ServiceError::Unauthorized
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<SessionData, ServiceError> {
    let key = session_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ServiceError::Unauthorized)?;

    if session.is_expired() {
        return Err(ServiceError::Unauthorized);
    }

    Ok(session.into())
}
