//! Authentication layers.
//!
//! Each console verifies its own token: admin tokens against
//! `ADMIN_SECRET_KEY`, tenant console tokens against `CAP_SECRET_KEY` and
//! invite links against `CUSTOMER_SECRET_KEY`. A token is only honoured when
//! its `id` matches the `userid` header.

mod admin_auth;
mod cap_auth;
mod invite_auth;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use tenantdesk_core::{Audience, Claims, TokenSigner};

use crate::extract::USER_ID_HEADER;

pub use admin_auth::{require_admin, require_admin_token};
pub use cap_auth::require_cap;
pub use invite_auth::require_invite;

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

fn user_id_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

/// Verified claims for `audience` whose `id` matches the `userid` header.
fn claims_for(signer: &TokenSigner, headers: &HeaderMap, audience: Audience) -> Option<Claims> {
    let claims = signer.verify(bearer(headers)?).ok()?;
    let header_id = user_id_header(headers)?;
    (claims.is_for(audience) && claims.id == header_id).then_some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(token: &str, user: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(token).unwrap());
        h.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        h
    }

    #[test]
    fn claims_need_matching_user_and_audience() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.sign(Claims::new("abc", Audience::Admin)).unwrap();

        assert!(claims_for(&signer, &headers(&token, "abc"), Audience::Admin).is_some());
        assert!(claims_for(&signer, &headers(&format!("Bearer {token}"), "abc"), Audience::Admin)
            .is_some());
        assert!(claims_for(&signer, &headers(&token, "other"), Audience::Admin).is_none());
        assert!(claims_for(&signer, &headers(&token, "abc"), Audience::Cap).is_none());

        let foreign = TokenSigner::new("other", 60);
        assert!(claims_for(&foreign, &headers(&token, "abc"), Audience::Admin).is_none());
    }
}
