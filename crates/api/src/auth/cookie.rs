//! The `jwt` session cookie.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

use crate::config::ServerConfig;

pub const JWT_COOKIE: &str = "jwt";

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, config: &ServerConfig) -> String {
    let max_age = config.jwt.cookie_expires_in_days * 24 * 60 * 60;
    let secure = if config.environment.is_production() {
        "; Secure"
    } else {
        ""
    };
    format!("{JWT_COOKIE}={token}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
}

/// `Set-Cookie` value that overwrites the session with a short-lived dummy.
pub fn logout_cookie() -> String {
    format!("{JWT_COOKIE}=loggedout; Path=/; Max-Age=10; HttpOnly; SameSite=Lax")
}

/// The token held in the request's `jwt` cookie, if any.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == JWT_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty() && *value != "loggedout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; jwt=abc.def.ghi; lang=en"));
        assert_eq!(token_from_cookies(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn logged_out_cookie_is_not_a_token() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt=loggedout"));
        assert_eq!(token_from_cookies(&headers), None);
        assert_eq!(token_from_cookies(&HeaderMap::new()), None);
    }
}
