use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use transit_core::identity::{Actor, Role};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Claims issued by the campus identity provider. Tokens are only
/// validated here, never minted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn actor(&self) -> Result<Actor, AppError> {
        let user_id = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthenticationError("Token subject is not a user id".to_string()))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AppError::AuthorizationError(format!("Unknown role {}", self.role)))?;
        Ok(Actor::new(user_id, role))
    }
}

fn bearer_token(req: &Request) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))
}

/// Validates the bearer JWT and stores the resulting `Actor` in the request
/// extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    let actor = token_data.claims.actor()?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = req
        .extensions()
        .get::<Actor>()
        .map(|actor| actor.role.is_admin())
        .unwrap_or(false);

    if !is_admin {
        return Err(AppError::AuthorizationError("Admin role required".to_string()));
    }
    Ok(next.run(req).await)
}
