use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use gravitalia_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Checks access tokens issued by the OAuth provider.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// RS256 tokens signed by the provider's private key.
    pub fn from_rsa_pem(pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            key: DecodingKey::from_rsa_pem(pem.as_bytes())?,
            validation: Validation::new(Algorithm::RS256),
        })
    }

    /// HS256 tokens, for deployments sharing a secret with the provider.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Returns the caller's vanity. Accepts an optional `Bearer ` prefix.
    pub fn verify(&self, token: &str) -> Option<String> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        decode::<Claims>(token, &self.key, &self.validation)
            .ok()
            .map(|data| data.claims.sub)
            .filter(|sub| !sub.is_empty())
    }
}

/// Who is calling, resolved from the `authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    /// Holder of the global key.
    Admin,
    User(String),
}

fn resolve(parts: &Parts, state: &AppState) -> Result<Caller, ApiError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(Caller::Anonymous);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidToken)?;
    if value.is_empty() {
        return Ok(Caller::Anonymous);
    }
    if !state.global_auth.is_empty() && value == state.global_auth {
        return Ok(Caller::Admin);
    }
    state
        .tokens
        .verify(value)
        .map(Caller::User)
        .ok_or(ApiError::InvalidToken)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
    }
}

/// An authenticated user.
#[derive(Debug, Clone)]
pub struct Viewer(pub String);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Caller::User(vanity) => Ok(Viewer(vanity)),
            _ => Err(ApiError::InvalidToken),
        }
    }
}

/// A user if a token was sent. A token that does not verify is still
/// rejected.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<String>);

impl FromRequestParts<AppState> for MaybeViewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Caller::User(vanity) => Ok(MaybeViewer(Some(vanity))),
            _ => Ok(MaybeViewer(None)),
        }
    }
}
