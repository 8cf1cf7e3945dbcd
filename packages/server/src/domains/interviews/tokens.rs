//! Signed, expiring, single-purpose action tokens for invitation links.
//!
//! A token authorizes exactly one accept or reject action on one interview.
//! Tokens are stateless: validation consults nothing but the signing key and
//! the clock. Single use is enforced by the interview state machine, not here;
//! once the action fires the `invitation_sent` precondition is gone and a
//! replay fails with an invalid-state conflict.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::common::EngineError;

const TOKEN_TYPE: &str = "interview_action";
const TOKEN_TTL_DAYS: i64 = 7;

/// The candidate action a token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAction {
    Accept,
    Reject,
}

impl TokenAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for TokenAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown token action: {}", other)),
        }
    }
}

impl fmt::Display for TokenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by an interview action token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionClaims {
    pub interview_id: Uuid,
    pub action: TokenAction,
    pub typ: String,
    /// Random nonce so two tokens for the same action are distinct
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
}

/// Creates and validates interview action tokens
#[derive(Clone)]
pub struct ActionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl ActionTokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Generate a token authorizing `action` on `interview_id`.
    ///
    /// Token expires after 7 days.
    pub fn generate(&self, interview_id: Uuid, action: TokenAction) -> Result<String> {
        let now = Utc::now();
        let claims = ActionClaims {
            interview_id,
            action,
            typ: TOKEN_TYPE.to_string(),
            nonce: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Validate a token against the interview and action the caller expects.
    ///
    /// Rejects on bad signature, wrong payload type, interview mismatch,
    /// action mismatch, or expiry. All failures collapse to `InvalidToken`;
    /// candidates never learn which check failed.
    pub fn validate(
        &self,
        interview_id: Uuid,
        token: &str,
        expected_action: TokenAction,
    ) -> Result<ActionClaims, EngineError> {
        let mut validation = Validation::default();
        // Expiry is exact; the default 60s leeway would let dead links linger.
        validation.leeway = 0;
        validation.validate_exp = true;

        let claims = decode::<ActionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "action token failed signature/expiry check");
                EngineError::InvalidToken
            })?;

        if claims.typ != TOKEN_TYPE {
            return Err(EngineError::InvalidToken);
        }
        if claims.interview_id != interview_id {
            return Err(EngineError::InvalidToken);
        }
        if claims.action != expected_action {
            return Err(EngineError::InvalidToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ActionTokenService {
        ActionTokenService::new("test_signing_secret")
    }

    #[test]
    fn test_generate_and_validate() {
        let svc = service();
        let interview_id = Uuid::new_v4();

        let token = svc.generate(interview_id, TokenAction::Accept).unwrap();
        let claims = svc
            .validate(interview_id, &token, TokenAction::Accept)
            .unwrap();

        assert_eq!(claims.interview_id, interview_id);
        assert_eq!(claims.action, TokenAction::Accept);
        assert_eq!(claims.typ, "interview_action");
    }

    #[test]
    fn test_tokens_are_unique_per_call() {
        let svc = service();
        let interview_id = Uuid::new_v4();

        let a = svc.generate(interview_id, TokenAction::Accept).unwrap();
        let b = svc.generate(interview_id, TokenAction::Accept).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_interview_mismatch_rejected() {
        let svc = service();
        let token = svc.generate(Uuid::new_v4(), TokenAction::Accept).unwrap();

        let result = svc.validate(Uuid::new_v4(), &token, TokenAction::Accept);
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_action_mismatch_rejected() {
        let svc = service();
        let interview_id = Uuid::new_v4();
        let token = svc.generate(interview_id, TokenAction::Accept).unwrap();

        let result = svc.validate(interview_id, &token, TokenAction::Reject);
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let interview_id = Uuid::new_v4();
        let token = ActionTokenService::new("secret_one")
            .generate(interview_id, TokenAction::Accept)
            .unwrap();

        let result = ActionTokenService::new("secret_two").validate(
            interview_id,
            &token,
            TokenAction::Accept,
        );
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let interview_id = Uuid::new_v4();

        // Hand-craft claims whose exp is already behind us
        let now = Utc::now();
        let claims = ActionClaims {
            interview_id,
            action: TokenAction::Accept,
            typ: "interview_action".to_string(),
            nonce: Uuid::new_v4().to_string(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_signing_secret"),
        )
        .unwrap();

        let result = svc.validate(interview_id, &token, TokenAction::Accept);
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_wrong_payload_type_rejected() {
        let svc = service();
        let interview_id = Uuid::new_v4();

        let now = Utc::now();
        let claims = ActionClaims {
            interview_id,
            action: TokenAction::Accept,
            typ: "password_reset".to_string(),
            nonce: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(7)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_signing_secret"),
        )
        .unwrap();

        let result = svc.validate(interview_id, &token, TokenAction::Accept);
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_expiry_is_seven_days() {
        let svc = service();
        let token = svc.generate(Uuid::new_v4(), TokenAction::Reject).unwrap();

        let mut validation = Validation::default();
        validation.leeway = 0;
        let claims = decode::<ActionClaims>(
            &token,
            &DecodingKey::from_secret(b"test_signing_secret"),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }
}
