//! Route access checks
//!
//! One guard for every page: each route declares a [`Requirement`] and it is
//! checked against the single [`AuthState`] the shell keeps for the session.

use tracing::warn;

use crate::identity::Principal;

pub const LOGIN_ROUTE: &str = "/login";
pub const HOME_ROUTE: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Identity provider has not reported yet
    Loading,
    SignedOut,
    SignedIn(Principal),
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::SignedIn(principal) => Some(principal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    /// Login and registration pages: signed-in users are sent home
    GuestOnly,
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// Show a spinner until the auth state settles
    Wait,
    Redirect(&'static str),
}

impl Requirement {
    pub fn check(self, auth: &AuthState) -> Result<(), Denied> {
        if self == Requirement::Public {
            return Ok(());
        }

        match (self, auth) {
            (_, AuthState::Loading) => Err(Denied::Wait),
            (Requirement::GuestOnly, AuthState::SignedIn(_)) => Err(Denied::Redirect(HOME_ROUTE)),
            (Requirement::GuestOnly, AuthState::SignedOut) => Ok(()),
            (_, AuthState::SignedOut) => Err(Denied::Redirect(LOGIN_ROUTE)),
            (Requirement::Admin, AuthState::SignedIn(principal)) if !principal.is_admin => {
                warn!(uid = %principal.uid, "admin route denied for non-admin user");
                Err(Denied::Redirect(HOME_ROUTE))
            }
            (_, AuthState::SignedIn(_)) => Ok(()),
        }
    }
}
