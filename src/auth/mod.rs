//! Authentication for API requests
//!
//! The access token is taken from `Authorization: Bearer <token>` or, when
//! that header is absent, from the `accessToken` cookie.

pub mod jwt;

pub use jwt::{extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator};

use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;

/// Find the access token in request headers
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    extract_token_from_header(auth).or_else(|| {
        let cookie = headers.get(COOKIE).and_then(|v| v.to_str().ok());
        extract_token_from_cookie(cookie)
    })
}
