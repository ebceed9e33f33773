use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use super::jwt::{JwtKeys, AUTH_COOKIE};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Access/refresh pair handed out on login.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_session(keys: &JwtKeys, user_id: Uuid) -> anyhow::Result<Session> {
    Ok(Session {
        access_token: keys.sign_access(user_id)?,
        refresh_token: keys.sign_refresh(user_id)?,
    })
}

/// `Set-Cookie` value carrying the access token for browser clients.
pub fn auth_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_auth_cookie(secure: bool) -> String {
    auth_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("dev@mockprep.io"));
        assert!(!is_valid_email("dev@localhost"));
        assert!(!is_valid_email("no spaces@x.io"));
        assert!(!is_valid_email(""));
        assert_eq!(normalize_email("  Dev@MockPrep.IO "), "dev@mockprep.io");
    }

    #[test]
    fn cookie_flags() {
        let cookie = auth_cookie("tok", 3600, false);
        assert_eq!(
            cookie,
            "authToken=tok; Path=/; HttpOnly; SameSite=Strict; Max-Age=3600"
        );
        assert!(auth_cookie("tok", 3600, true).ends_with("; Secure"));
        assert!(clear_auth_cookie(false).starts_with("authToken=; "));
        assert!(clear_auth_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn session_tokens_have_distinct_kinds() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 60,
            refresh_ttl_minutes: 120,
        });
        let id = Uuid::new_v4();
        let session = issue_session(&keys, id).unwrap();
        assert!(keys.verify_refresh(&session.refresh_token).is_ok());
        assert!(keys.verify_refresh(&session.access_token).is_err());
        assert_eq!(keys.verify(&session.access_token).unwrap().sub, id);
    }
}
