//! Signed-in principal and bearer token minting

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            is_admin: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Token refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Token issued for a different user: {0}")]
    PrincipalMismatch(String),

    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of the current principal and of short-lived bearer tokens for it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_principal(&self) -> Option<Principal>;

    /// Mint a bearer token for `principal`. Fails with
    /// [`IdentityError::NotSignedIn`] when nobody is signed in.
    async fn id_token(&self, principal: &Principal) -> Result<String, IdentityError>;
}

/// Fixed principal and pre-minted token.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    principal: Option<Principal>,
    token: String,
}

impl StaticIdentity {
    pub fn new(principal: Principal, token: impl Into<String>) -> Self {
        Self {
            principal: Some(principal),
            token: token.into(),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            principal: None,
            token: String::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }

    async fn id_token(&self, principal: &Principal) -> Result<String, IdentityError> {
        match &self.principal {
            Some(p) if p.uid == principal.uid => Ok(self.token.clone()),
            Some(p) => Err(IdentityError::PrincipalMismatch(p.uid.clone())),
            None => Err(IdentityError::NotSignedIn),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    user_id: Option<String>,
}

/// Exchanges a long-lived refresh token for a fresh ID token on every call.
pub struct RefreshTokenIdentity {
    client: reqwest::Client,
    token_url: String,
    refresh_token: String,
    principal: Principal,
}

impl RefreshTokenIdentity {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        refresh_token: impl Into<String>,
        principal: Principal,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            refresh_token: refresh_token.into(),
            principal,
        }
    }
}

#[async_trait]
impl IdentityProvider for RefreshTokenIdentity {
    fn current_principal(&self) -> Option<Principal> {
        Some(self.principal.clone())
    }

    #[instrument(skip(self, principal), fields(uid = %principal.uid))]
    async fn id_token(&self, principal: &Principal) -> Result<String, IdentityError> {
        if principal.uid != self.principal.uid {
            return Err(IdentityError::PrincipalMismatch(principal.uid.clone()));
        }

        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = resp.json().await?;
        if let Some(user_id) = token.user_id {
            if user_id != principal.uid {
                return Err(IdentityError::PrincipalMismatch(user_id));
            }
        }

        debug!("minted fresh id token");
        Ok(token.id_token)
    }
}
