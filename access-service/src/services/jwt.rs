use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use uuid::Uuid;

use super::error::ServiceError;
use crate::config::JwtConfig;

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both tokens of a pair. `jti` is the session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub jti: String,
    pub sub: String,
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub typ: TokenKind,
}

impl TokenClaims {
    pub fn user_id(&self) -> Result<i64, ServiceError> {
        self.sub
            .parse()
            .map_err(|_| ServiceError::InvalidToken(format!("subject {:?} is not a user id", self.sub)))
    }
}

#[derive(Debug, Deserialize)]
struct SessionRef {
    jti: String,
}

/// Access and refresh token sharing one session id.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies RS256 tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl JwtService {
    /// Create the service by loading PEM keys from the configured paths.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            )
        })?;

        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            )
        })?;

        Self::from_pem(private_key_pem.as_bytes(), public_key_pem.as_bytes(), config)
    }

    pub fn from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        config: &JwtConfig,
    ) -> Result<Self, anyhow::Error> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        tracing::info!(issuer = %config.issuer, "JWT service initialized with RS256 keys");

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    /// Issue a pair under a fresh session id.
    pub fn issue_token_pair(&self, user_id: i64, role: &str) -> Result<TokenPair, ServiceError> {
        let session_id = Uuid::new_v4().to_string();
        self.issue_for_session(&session_id, user_id, role)
    }

    /// Issue a pair under an existing session id.
    pub fn issue_for_session(
        &self,
        session_id: &str,
        user_id: i64,
        role: &str,
    ) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();

        let access_token = self.sign(&TokenClaims {
            jti: session_id.to_string(),
            sub: user_id.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp(),
            typ: TokenKind::Access,
        })?;

        let refresh_token = self.sign(&TokenClaims {
            jti: session_id.to_string(),
            sub: user_id.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::days(self.refresh_token_expiry_days)).timestamp(),
            typ: TokenKind::Refresh,
        })?;

        Ok(TokenPair {
            session_id: session_id.to_string(),
            access_token,
            refresh_token,
        })
    }

    pub(crate) fn sign(&self, claims: &TokenClaims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Full verification: signature, issuer, `exp` and `nbf` with no leeway.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| ServiceError::InvalidToken(e.to_string()))
    }

    /// Verify and additionally require the given token kind.
    pub fn verify_token_kind(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<TokenClaims, ServiceError> {
        let claims = self.verify_token(token)?;
        if claims.typ != kind {
            return Err(ServiceError::InvalidToken(format!(
                "expected {:?} token, got {:?}",
                kind, claims.typ
            )));
        }
        Ok(claims)
    }

    /// Signature-only check that yields the session id. Expired tokens are
    /// accepted so a client can always log out.
    pub fn decode_session_id(&self, token: &str) -> Result<String, ServiceError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;

        decode::<SessionRef>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.jti)
            .map_err(|e| ServiceError::InvalidToken(e.to_string()))
    }

    /// Access token lifetime in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

/// Strip an optional `Bearer ` prefix from an authorization value.
pub fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/jwt_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/jwt_public.pem");
    const FOREIGN_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/jwt_foreign_public.pem");

    fn config(private_key_path: &str, public_key_path: &str) -> JwtConfig {
        JwtConfig {
            private_key_path: private_key_path.to_string(),
            public_key_path: public_key_path.to_string(),
            issuer: "access-service".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        }
    }

    fn service() -> JwtService {
        JwtService::from_pem(
            PRIVATE_KEY.as_bytes(),
            PUBLIC_KEY.as_bytes(),
            &config("", ""),
        )
        .unwrap()
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_keys_from_files() {
        let private = write_temp(PRIVATE_KEY);
        let public = write_temp(PUBLIC_KEY);
        let cfg = config(
            private.path().to_str().unwrap(),
            public.path().to_str().unwrap(),
        );

        assert!(JwtService::new(&cfg).is_ok());
    }

    #[test]
    fn missing_key_file_is_reported() {
        let err = JwtService::new(&config("/nonexistent/private.pem", "/nonexistent/public.pem"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/private.pem"));
    }

    #[test]
    fn pair_shares_session_and_differs_in_kind() {
        let jwt = service();
        let pair = jwt.issue_token_pair(42, "member").unwrap();

        let access = jwt.verify_token_kind(&pair.access_token, TokenKind::Access).unwrap();
        let refresh = jwt.verify_token_kind(&pair.refresh_token, TokenKind::Refresh).unwrap();

        assert_eq!(access.jti, pair.session_id);
        assert_eq!(refresh.jti, pair.session_id);
        assert_eq!(access.user_id().unwrap(), 42);
        assert_eq!(access.role, "member");
        assert_eq!(access.iss, "access-service");
        assert!(refresh.exp > access.exp);
        assert_eq!(access.exp - access.iat, 15 * 60);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let jwt = service();
        let pair = jwt.issue_token_pair(1, "member").unwrap();

        assert!(matches!(
            jwt.verify_token_kind(&pair.refresh_token, TokenKind::Access),
            Err(ServiceError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_rejected_but_still_yields_session_id() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let token = jwt
            .sign(&TokenClaims {
                jti: "session-1".to_string(),
                sub: "7".to_string(),
                role: "member".to_string(),
                iss: "access-service".to_string(),
                iat: now - 3600,
                nbf: now - 3600,
                exp: now - 60,
                typ: TokenKind::Access,
            })
            .unwrap();

        assert!(matches!(
            jwt.verify_token(&token),
            Err(ServiceError::InvalidToken(_))
        ));
        assert_eq!(jwt.decode_session_id(&token).unwrap(), "session-1");
    }

    #[test]
    fn not_yet_valid_token_rejected() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let token = jwt
            .sign(&TokenClaims {
                jti: "session-2".to_string(),
                sub: "7".to_string(),
                role: "member".to_string(),
                iss: "access-service".to_string(),
                iat: now,
                nbf: now + 600,
                exp: now + 1200,
                typ: TokenKind::Access,
            })
            .unwrap();

        assert!(jwt.verify_token(&token).is_err());
    }

    #[test]
    fn foreign_issuer_rejected() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let token = jwt
            .sign(&TokenClaims {
                jti: "session-3".to_string(),
                sub: "7".to_string(),
                role: "member".to_string(),
                iss: "someone-else".to_string(),
                iat: now,
                nbf: now,
                exp: now + 600,
                typ: TokenKind::Access,
            })
            .unwrap();

        assert!(jwt.verify_token(&token).is_err());
    }

    #[test]
    fn wrong_verification_key_rejected() {
        let signer = service();
        let verifier = JwtService::from_pem(
            PRIVATE_KEY.as_bytes(),
            FOREIGN_PUBLIC_KEY.as_bytes(),
            &config("", ""),
        )
        .unwrap();
        let pair = signer.issue_token_pair(5, "member").unwrap();

        assert!(verifier.verify_token(&pair.access_token).is_err());
        assert!(verifier.decode_session_id(&pair.access_token).is_err());
    }

    #[test]
    fn strip_bearer_variants() {
        assert_eq!(strip_bearer("Bearer abc.def"), "abc.def");
        assert_eq!(strip_bearer("bearer abc.def"), "abc.def");
        assert_eq!(strip_bearer("abc.def"), "abc.def");
    }
}
