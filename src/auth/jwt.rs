//! HS256 JSON Web Tokens carrying the principal's id and role.

use super::{AuthError, TokenIssuer, TokenVerifier};
use crate::extractors::Principal;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Clock skew tolerated on `exp`, in seconds.
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub uid: String,
    /// "user" or "admin"
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> Self {
        JwtKeys {
            issuer: issuer.into(),
            ttl,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| AuthError::Issue(e.to_string()))
    }

    pub fn parse(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = LEEWAY_SECS;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, uid: &str, role: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        self.issue_claims(&Claims {
            uid: uid.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        })
    }
}

impl TokenVerifier for JwtKeys {
    fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.parse(token)?;
        Ok(Principal::new(claims.uid, claims.role))
    }
}
