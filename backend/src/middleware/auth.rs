//! Authentication middleware
//!
//! Validates the bearer token and places the acting user in the request
//! extensions. Issuing tokens is the job of the surrounding application.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub organization_id: uuid::Uuid,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return AppError::NotAuthenticated.into_response(),
    };

    let auth_user = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    organization_id: String,
    exp: i64,
    iat: i64,
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::InvalidToken(e.to_string()))?;

    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::InvalidToken("Invalid user ID in token".to_string()))?;
    let organization_id = uuid::Uuid::parse_str(&claims.organization_id)
        .map_err(|_| AppError::InvalidToken("Invalid organization ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        organization_id,
    })
}

/// Extractor for authenticated user
///
/// Rejects with `NotAuthenticated` when no identity is attached to the request,
/// before the handler can reach any write.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, organization_id: &str, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            organization_id: organization_id.to_string(),
            exp: now + 3600,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let user_id = uuid::Uuid::new_v4();
        let organization_id = uuid::Uuid::new_v4();
        let jwt = token(&user_id.to_string(), &organization_id.to_string(), "secret");

        let user = decode_jwt(&jwt, "secret").unwrap();

        assert_eq!(user.user_id, user_id);
        assert_eq!(user.organization_id, organization_id);
    }

    #[test]
    fn test_decode_wrong_secret() {
        let jwt = token(&uuid::Uuid::new_v4().to_string(), &uuid::Uuid::new_v4().to_string(), "secret");
        assert!(matches!(decode_jwt(&jwt, "other"), Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_decode_bad_subject() {
        let jwt = token("not-a-uuid", &uuid::Uuid::new_v4().to_string(), "secret");
        assert!(matches!(decode_jwt(&jwt, "secret"), Err(AppError::InvalidToken(_))));
    }
}
