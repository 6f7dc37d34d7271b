use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// Result of a sign-up: a session when the project auto-confirms accounts,
/// otherwise only the pending user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired(AuthUser),
}

impl SignUpOutcome {
    pub fn user(&self) -> &AuthUser {
        match self {
            SignUpOutcome::SignedIn(session) => &session.user,
            SignUpOutcome::ConfirmationRequired(user) => user,
        }
    }
}
