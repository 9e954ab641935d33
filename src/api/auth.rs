//! Admin authentication for `/api/admin/*`.
//!
//! Requests carry `Authorization: Bearer <name>:<secret>`; the secret is
//! checked against the Argon2 hash configured for that admin in
//! `[[admins]]`. Failures are recorded on the `security` log target.

use std::sync::Arc;

use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use log::warn;
use password_hash::{PasswordHash, PasswordVerifier};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::config::AdminCredential;
use crate::diary::errors::DiaryError;
use crate::logutil::{escape_log, sec_log};

/// Name of the authenticated admin, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity(pub String);

#[derive(Debug, Clone, Default)]
pub struct AdminRegistry {
    admins: Vec<AdminCredential>,
}

impl AdminRegistry {
    pub fn new(admins: Vec<AdminCredential>) -> Self {
        Self { admins }
    }

    pub fn is_empty(&self) -> bool {
        !self.admins.iter().any(|a| a.password_hash.is_some())
    }

    /// Unknown names and admins without a configured hash never verify.
    pub fn verify(&self, name: &str, secret: &str) -> bool {
        let Some(admin) = self.admins.iter().find(|a| a.name == name) else {
            return false;
        };
        let Some(stored) = &admin.password_hash else {
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("admin {} has a corrupt password hash: {}", escape_log(name), e);
                false
            }
        }
    }
}

/// Splits `Bearer name:secret`. The secret may itself contain ':'.
pub fn parse_credentials(header: &str) -> Option<(&str, &str)> {
    let token = header.strip_prefix("Bearer ")?.trim();
    let (name, secret) = token.split_once(':')?;
    if name.is_empty() || secret.is_empty() {
        return None;
    }
    Some((name, secret))
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let credentials = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_credentials)
        .map(|(name, secret)| (name.to_string(), secret.to_string()));
    let Some((name, secret)) = credentials else {
        sec_log!("ADMIN auth missing for {} {}", req.method(), escape_log(&path));
        return Err(ApiError::Unauthorized("admin credentials required".to_string()));
    };

    let registry = Arc::clone(&state.admins);
    let candidate = name.clone();
    let verified = tokio::task::spawn_blocking(move || registry.verify(&candidate, &secret))
        .await
        .map_err(|e| DiaryError::Internal(format!("auth task failed: {}", e)))?;
    if !verified {
        sec_log!("ADMIN auth failed for {} on {}", escape_log(&name), escape_log(&path));
        return Err(ApiError::Unauthorized("invalid admin credentials".to_string()));
    }

    req.extensions_mut().insert(AdminIdentity(name));
    Ok(next.run(req).await)
}
