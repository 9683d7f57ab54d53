use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving the current user
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Administrator role required")]
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn require_admin(&self) -> Result<(), IdentityError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::User => Err(IdentityError::Forbidden),
        }
    }
}

/// Current-user lookup consumed by the submission flows
#[mockall::automock]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Result<Identity, IdentityError>;
}

/// Identity fixed at construction, e.g. resolved from a request's token
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    identity: Option<Identity>,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<Identity, IdentityError> {
        self.identity.clone().ok_or(IdentityError::Unauthenticated)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    role: Role,
    exp: i64,
}

/// HS256 bearer token verification
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify an `Authorization` header value of the form `Bearer <token>`
    pub fn verify_header(&self, header: Option<&str>) -> Result<Identity, IdentityError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::Unauthenticated)?;
        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(Identity {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }

    /// Issue a token for `identity`, valid for `ttl`
    ///
    /// Tokens carry no issuer claim, so only verifiers without an issuer
    /// requirement accept them.
    pub fn issue(&self, identity: &Identity, ttl: chrono::Duration) -> Result<String, IdentityError> {
        let claims = Claims {
            sub: identity.user_id.clone(),
            role: identity.role,
            exp: (chrono::Utc::now() + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}
