//! Login input checks. Failures are 400s with a message naming the field.

use super::actions::LoginInput;
use crate::error::ApiError;
use regex::Regex;

pub const NAME_MAX_CHARS: usize = 64;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Trim the input and check it; returns the cleaned copy.
pub fn validate_login(input: &LoginInput) -> Result<LoginInput, ApiError> {
    let email = input.email.trim();
    let name = input.name.trim();

    if email.is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }
    let re = Regex::new(EMAIL_PATTERN).map_err(|e| ApiError::internal("invalid email pattern", e))?;
    if !re.is_match(email) {
        return Err(ApiError::bad_request("email must be a valid email"));
    }
    if input.password.is_empty() {
        return Err(ApiError::bad_request("password is required"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(ApiError::bad_request(format!(
            "name must be at most {} characters",
            NAME_MAX_CHARS
        )));
    }
    Ok(LoginInput {
        email: email.to_string(),
        password: input.password.clone(),
        name: name.to_string(),
    })
}

/// Display name for a new account: the given one, else the email's local part, else "user".
pub fn default_name(email: &str, name: &str) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    match email.find('@') {
        Some(at) if at > 0 => email[..at].to_string(),
        _ => "user".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::CODE_BAD_REQUEST;

    fn input(email: &str, password: &str, name: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    #[test]
    fn trims_and_accepts_valid_input() {
        let out = validate_login(&input("  ann@example.com ", "pw", " Ann ")).unwrap();
        assert_eq!(out.email, "ann@example.com");
        assert_eq!(out.name, "Ann");
    }

    #[test]
    fn rejects_bad_fields() {
        for (email, password, name, msg) in [
            ("", "pw", "", "email is required"),
            ("not-an-email", "pw", "", "email must be a valid email"),
            ("a@b.co", "", "", "password is required"),
        ] {
            let err = validate_login(&input(email, password, name)).unwrap_err();
            assert_eq!(err.code, CODE_BAD_REQUEST);
            assert_eq!(err.message, msg);
        }
        let long = "x".repeat(NAME_MAX_CHARS + 1);
        assert!(validate_login(&input("a@b.co", "pw", &long)).is_err());
        let exact = "é".repeat(NAME_MAX_CHARS);
        assert!(validate_login(&input("a@b.co", "pw", &exact)).is_ok());
    }

    #[test]
    fn name_falls_back_to_local_part() {
        assert_eq!(default_name("ann@example.com", ""), "ann");
        assert_eq!(default_name("ann@example.com", "Ann"), "Ann");
        assert_eq!(default_name("@example.com", ""), "user");
    }
}
