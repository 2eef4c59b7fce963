use crate::auth::{authenticate_user, jwt::create_token, LoginRequest, LoginResponse, UserInfo};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::time::{Duration, SystemTime};

const MAX_ATTEMPTS: u32 = 5;
const ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    // 5 attempts per 15 minutes per username
    {
        let mut attempts = state.login_attempts.write().await;
        let entry = attempts
            .entry(payload.username.clone())
            .or_insert((0, SystemTime::now()));

        if entry.1.elapsed().unwrap_or(Duration::ZERO) > ATTEMPT_WINDOW {
            *entry = (0, SystemTime::now());
        }

        if entry.0 >= MAX_ATTEMPTS {
            tracing::warn!("Login rate limit exceeded for user: {}", payload.username);
            return Err(AppError::RateLimited);
        }

        entry.0 += 1;
    }

    let response = login_inner(&state, &payload)?;

    // Reset rate limit on successful login
    state.login_attempts.write().await.remove(&payload.username);

    Ok(Json(response))
}

fn login_inner(state: &AppState, payload: &LoginRequest) -> AppResult<LoginResponse> {
    let mut conn = state.db.get()?;

    let user = authenticate_user(&mut conn, &payload.username, &payload.password).map_err(|e| {
        tracing::info!("Failed login for {}: {}", payload.username, e);
        AppError::Unauthenticated
    })?;

    let token = create_token(
        user.id,
        &user.username,
        user.role.as_deref(),
        &state.config.jwt.secret,
        state.config.jwt.expiration_hours,
    )?;

    tracing::info!("User {} logged in", user.username);
    Ok(LoginResponse {
        token,
        user: UserInfo::from(&user),
    })
}

pub async fn logout() -> StatusCode {
    // Tokens are stateless; the client discards its copy.
    StatusCode::OK
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserInfo> {
    Json(UserInfo::from(&user))
}
