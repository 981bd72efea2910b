use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::User,
    repository::RepositoryState,
};

/// Header that binds a principal directly in the local environment.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the HS256 bearer tokens issued at registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id, as a string per RFC 7519.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Signs a bearer token for `user_id`, valid for `config.token_ttl_secs`.
pub fn issue_token(config: &AppConfig, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let ttl = usize::try_from(config.token_ttl_secs).unwrap_or(usize::MAX);
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        // Saturates so an oversized TOKEN_TTL_SECS means "never expires", not "already expired".
        exp: now.saturating_add(ttl),
    };
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// Validates signature and expiry of `token` and returns the user id it names.
pub fn verify_token(config: &AppConfig, token: &str) -> Result<i64, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AppError::Unauthenticated
    })?;
    data.claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthenticated)
}

/// AuthUser
///
/// The resolved principal of an authenticated request. Handlers take it as an
/// argument; a request that cannot produce one is rejected with 401 before the
/// handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Resolution order:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. `Authorization: Bearer <token>`, decoded and validated.
/// 3. The user is re-read from the database, so deleted users lose access
///    even while their token is still valid.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bound_id = parts
                .headers
                .get(USER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok());
            if let Some(user_id) = bound_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    let auth_user = AuthUser { user };
                    parts.extensions.insert(auth_user.clone());
                    return Ok(auth_user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AppError::Unauthenticated)?;

        let user_id = verify_token(&config, token)?;
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        // Cached so the route-layer check and the handler share one lookup.
        let auth_user = AuthUser { user };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}
