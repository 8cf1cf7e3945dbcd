//! Recruiter session authentication.
//!
//! Session issuance lives with the external auth service; this middleware
//! only verifies the shared-secret JWT and attaches the caller's identity.
//! Requests without a valid token continue unauthenticated: candidate
//! action links carry their own tokens, and employer handlers check for
//! the extension themselves.

use anyhow::Result;
use axum::{middleware::Next, response::Response};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Authenticated caller extracted from the session JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Session JWT claims (issued externally, verified here)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Verifies recruiter session tokens against the shared secret
#[derive(Clone)]
pub struct SessionJwt {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl SessionJwt {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Issue a session token. The auth collaborator owns issuance in
    /// production; this exists for tooling and tests.
    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            user_id,
            exp: (now + chrono::Duration::hours(24)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

/// JWT authentication middleware
///
/// Extracts the bearer token, verifies it, and adds `AuthUser` to request
/// extensions. Invalid or missing tokens leave the request unauthenticated.
pub async fn jwt_auth_middleware(
    jwt: Arc<SessionJwt>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(user) = extract_auth_user(&request, &jwt) {
        debug!(user_id = %user.user_id, "authenticated recruiter");
        request.extensions_mut().insert(user);
    } else {
        debug!("no valid session token");
    }

    next.run(request).await
}

fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    jwt: &SessionJwt,
) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = jwt.verify_token(token).ok()?;
    Some(AuthUser {
        user_id: claims.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let jwt = SessionJwt::new("test_secret", "hireflow".to_string());
        let user_id = Uuid::new_v4();
        let token = jwt.create_token(user_id).unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.iss, "hireflow");
    }

    #[test]
    fn test_extract_with_bearer_prefix() {
        let jwt = SessionJwt::new("test_secret", "hireflow".to_string());
        let user_id = Uuid::new_v4();
        let token = jwt.create_token(user_id).unwrap();

        let request = axum::http::Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(axum::body::Body::empty())
            .unwrap();
        let user = extract_auth_user(&request, &jwt);
        assert_eq!(user.unwrap().user_id, user_id);
    }

    #[test]
    fn test_invalid_token_is_anonymous() {
        let jwt = SessionJwt::new("test_secret", "hireflow".to_string());
        let request = axum::http::Request::builder()
            .header("authorization", "Bearer garbage")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(extract_auth_user(&request, &jwt).is_none());
    }

    #[test]
    fn test_wrong_secret_is_anonymous() {
        let issuer = SessionJwt::new("secret_one", "hireflow".to_string());
        let verifier = SessionJwt::new("secret_two", "hireflow".to_string());
        let token = issuer.create_token(Uuid::new_v4()).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }
}
