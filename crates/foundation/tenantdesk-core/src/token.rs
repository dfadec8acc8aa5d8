//! HS256 JWT signing and verification.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Token audience, carried in the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Admin,
    /// Admin password reset links. Never accepted as a session.
    AdminReset,
    Cap,
    /// Invite links mailed to leads.
    Customer,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::Admin => "admin",
            Audience::AdminReset => "admin-reset",
            Audience::Cap => "cap",
            Audience::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub sub: String,
    /// Sealed plan end date (CAP tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Sealed role name (CAP tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
}

impl Claims {
    pub fn new(id: impl Into<String>, audience: Audience) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            sub: audience.as_str().to_string(),
            time: None,
            role: None,
            iat: 0,
            exp: 0,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn time(mut self, sealed: impl Into<String>) -> Self {
        self.time = Some(sealed.into());
        self
    }

    pub fn role(mut self, sealed: impl Into<String>) -> Self {
        self.role = Some(sealed.into());
        self
    }

    pub fn is_for(&self, audience: Audience) -> bool {
        self.sub == audience.as_str()
    }
}

/// Signs and verifies tokens for one secret with a fixed lifetime.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn sign(&self, mut claims: Claims) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        claims.iat = now;
        claims.exp = now + self.ttl_secs as i64;
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Checks signature and expiry. Audience checks are left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Parse an expiry such as `1d`, `12h`, `30m`, `3600s` or bare seconds.
pub fn parse_duration(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidDuration(raw.to_string()))?;
    let factor = match unit.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "week" | "weeks" => 604_800,
        _ => return Err(Error::InvalidDuration(raw.to_string())),
    };
    Ok(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let signer = TokenSigner::new("admin-secret", 3600);
        let token = signer
            .sign(Claims::new("abc", Audience::Admin).username("superadmin"))
            .unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.id, "abc");
        assert_eq!(claims.username.as_deref(), Some("superadmin"));
        assert!(claims.is_for(Audience::Admin));
        assert!(!claims.is_for(Audience::Cap));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn reset_links_are_not_sessions() {
        let signer = TokenSigner::new("admin-secret", 60);
        let token = signer
            .sign(Claims::new("abc", Audience::AdminReset).email("root@acme.test"))
            .unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "admin-reset");
        assert!(claims.is_for(Audience::AdminReset));
        assert!(!claims.is_for(Audience::Admin));
    }

    #[test]
    fn bearer_prefix_is_accepted() {
        let signer = TokenSigner::new("s", 60);
        let token = signer.sign(Claims::new("1", Audience::Cap)).unwrap();
        assert!(signer.verify(&format!("Bearer {token}")).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenSigner::new("one", 60)
            .sign(Claims::new("1", Audience::Customer).email("a@b.io"))
            .unwrap();
        assert!(TokenSigner::new("two", 60).verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new("s", 0);
        let mut claims = Claims::new("1", Audience::Admin);
        claims.iat = 0;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Claims { exp: 1, ..claims },
            &EncodingKey::from_secret(b"s"),
        )
        .unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1d").unwrap(), 86_400);
        assert_eq!(parse_duration("12h").unwrap(), 43_200);
        assert_eq!(parse_duration("30m").unwrap(), 1_800);
        assert_eq!(parse_duration("3600s").unwrap(), 3_600);
        assert_eq!(parse_duration("900").unwrap(), 900);
        assert_eq!(parse_duration("2 days").unwrap(), 172_800);
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5y").is_err());
    }
}
