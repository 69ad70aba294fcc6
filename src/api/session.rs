//! Session-cookie middleware. Mints an opaque per-connection session token
//! the first time a client shows up without one; every handler downstream
//! reads it back out of the cookie jar. The token has no meaning beyond
//! channel routing — there is no login, no user record behind it.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::core::constants::{SESSION_COOKIE_NAME, SESSION_TOKEN_BYTES};
use crate::utils::crypto::generate_token;

fn is_tls_terminated(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Read the session token out of the request, if present.
pub fn session_from_jar(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string())
}

/// Ensure every request carries a `malten_session` cookie, minting one on
/// first contact. The minted value is stashed in request extensions so
/// handlers that run before the response cookie round-trips can still read
/// it within the same request.
pub async fn ensure_session(jar: CookieJar, mut req: Request, next: Next) -> Response {
    let secure = is_tls_terminated(req.headers());
    let existing = session_from_jar(&jar);

    let session = existing.clone().unwrap_or_else(|| generate_token(SESSION_TOKEN_BYTES));
    req.extensions_mut().insert(SessionToken(session.clone()));

    let mut response = next.run(req).await;

    if existing.is_none() {
        let cookie = Cookie::build((SESSION_COOKIE_NAME, session))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .secure(secure)
            .build();
        let jar = CookieJar::new().add(cookie);
        for value in jar.iter().filter_map(|c| c.encoded().to_string().parse().ok()) {
            response.headers_mut().append(axum::http::header::SET_COOKIE, value);
        }
    }

    response
}

/// The resolved session token for the current request, injected by
/// [`ensure_session`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn detects_tls_via_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert!(!is_tls_terminated(&headers));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert!(is_tls_terminated(&headers));
    }
}
