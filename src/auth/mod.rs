//! Authentication collaborators: token verification/issuance, password hashing, and
//! the middleware that attaches a [`Principal`](crate::extractors::Principal) to requests.

mod jwt;
mod middleware;
mod password;

pub use jwt::{Claims, JwtKeys};
pub use middleware::{authenticate, bearer_token, require_auth, AuthGuard};
pub use password::{Argon2Hasher, PasswordHasher};

use crate::extractors::Principal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("token issue failed: {0}")]
    Issue(String),
    #[error("password hash: {0}")]
    Hash(String),
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, uid: &str, role: &str) -> Result<String, AuthError>;
}

pub type SharedVerifier = Arc<dyn TokenVerifier>;
pub type SharedIssuer = Arc<dyn TokenIssuer>;
