/// Admin gate and access tokens
///
/// The admin password is checked on the server and exchanged for a signed
/// admin token. Unlocking a document issues a short-lived view token bound to
/// that document and its current password.
use crate::{
    context::AppContext,
    error::{PanelError, PanelResult},
    models::Document,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ADMIN_SCOPE: &str = "admin";
const VIEW_SCOPE: &str = "view";
const ADMIN_SUBJECT: &str = "panel-admin";

/// Signed token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub scope: String,
    pub exp: i64,
    pub iat: i64,
    /// Fingerprint of the document password a view token was issued against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}

/// Issued token with its expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Admin password check plus token signing
pub struct AdminGate {
    admin_password: String,
    jwt_secret: String,
    admin_ttl: Duration,
    view_ttl: Duration,
}

impl AdminGate {
    pub fn new(admin_password: &str, jwt_secret: &str, admin_ttl_secs: i64, view_ttl_secs: i64) -> Self {
        Self {
            admin_password: admin_password.to_string(),
            jwt_secret: jwt_secret.to_string(),
            admin_ttl: Duration::seconds(admin_ttl_secs),
            view_ttl: Duration::seconds(view_ttl_secs),
        }
    }

    /// Exchange the admin password for an admin token
    pub fn login(&self, password: &str) -> PanelResult<IssuedToken> {
        if password != self.admin_password {
            tracing::warn!("Rejected admin login attempt");
            return Err(PanelError::Authentication("Wrong admin password".to_string()));
        }

        tracing::info!("Admin logged in");
        self.sign(ADMIN_SUBJECT, ADMIN_SCOPE, self.admin_ttl, None)
    }

    pub fn verify_admin(&self, token: &str) -> PanelResult<TokenClaims> {
        let claims = self.verify(token)?;
        if claims.scope != ADMIN_SCOPE {
            return Err(PanelError::Authentication(
                "Token does not have admin scope".to_string(),
            ));
        }
        Ok(claims)
    }

    /// Token allowing one document to be opened
    pub fn issue_view_token(&self, doc: &Document) -> PanelResult<IssuedToken> {
        self.sign(
            &doc.id,
            VIEW_SCOPE,
            self.view_ttl,
            Some(password_fingerprint(&doc.password)),
        )
    }

    /// Check a view token against the document's current id and password
    pub fn verify_view_token(&self, token: &str, doc: &Document) -> PanelResult<()> {
        let claims = self
            .verify(token)
            .map_err(|e| PanelError::AccessDenied(e.to_string()))?;

        if claims.scope != VIEW_SCOPE || claims.sub != doc.id {
            return Err(PanelError::AccessDenied(
                "Token is not valid for this document".to_string(),
            ));
        }

        if claims.pwd.as_deref() != Some(password_fingerprint(&doc.password).as_str()) {
            return Err(PanelError::AccessDenied(
                "Document password has changed".to_string(),
            ));
        }

        Ok(())
    }

    fn sign(&self, subject: &str, scope: &str, ttl: Duration, pwd: Option<String>) -> PanelResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = TokenClaims {
            sub: subject.to_string(),
            scope: scope.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            pwd,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| PanelError::Jwt(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    fn verify(&self, token: &str) -> PanelResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    PanelError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    PanelError::Authentication("Invalid token signature".to_string())
                }
                _ => PanelError::Authentication(format!("Invalid token: {}", e)),
            }
        })
    }
}

fn password_fingerprint(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    hex::encode(&digest[..8])
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Admin context - requires a valid admin token
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub claims: TokenClaims,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = PanelError;

    async fn from_request_parts(parts: &mut Parts, state: &AppContext) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| PanelError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.gate.verify_admin(&token)?;
        Ok(AdminAuthContext { claims })
    }
}
