use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Resolves the bearer token to a user row and attaches it (and the claims)
/// to the request. Handlers derive the acting `Actor` from that row.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    use crate::models::User;
    use crate::schema::users::dsl::*;
    use diesel::prelude::*;

    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let claims = verify_token(token, &state.config.jwt.secret).map_err(|e| {
        tracing::debug!("Auth Middleware - {}", e);
        AppError::Unauthenticated
    })?;

    let mut conn = state.db.get()?;

    let user = users
        .filter(id.eq(claims.user_id))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?
        .ok_or_else(|| {
            tracing::warn!("Auth Middleware - token for unknown user {}", claims.user_id);
            AppError::Unauthenticated
        })?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
