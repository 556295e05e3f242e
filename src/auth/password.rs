use super::AuthError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// False for a mismatch or an unparsable hash.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with a random salt per hash, PHC string output.
#[derive(Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let h = Argon2Hasher.hash("s3cret").unwrap();
        assert!(h.starts_with("$argon2"));
        assert!(Argon2Hasher.verify("s3cret", &h));
        assert!(!Argon2Hasher.verify("wrong", &h));
        assert!(!Argon2Hasher.verify("s3cret", "not-a-hash"));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(Argon2Hasher.hash("x").unwrap(), Argon2Hasher.hash("x").unwrap());
    }
}
