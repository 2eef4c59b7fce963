use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// The record is not in the state the operation requires. Also covers a
    /// conditional update that lost a race against another actor.
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Too many login attempts, try again later")]
    RateLimited,

    #[error("All AI providers failed. Last error: {last_error}")]
    ProviderExhausted { last_error: String },

    #[error("Invalid data: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        AppError::NotFound { entity, id }
    }

    /// Stable machine-readable tag sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::IllegalTransition(_) => "illegal_transition",
            AppError::Authorization(_) => "authorization",
            AppError::Unauthenticated => "unauthenticated",
            AppError::RateLimited => "rate_limited",
            AppError::ProviderExhausted { .. } => "provider_exhausted",
            AppError::Validation(_) => "validation",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::IllegalTransition(_) => StatusCode::CONFLICT,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::ProviderExhausted { .. } => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!("Failed to get DB connection: {}", e);
                "Database unavailable".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_rejections_are_distinguishable() {
        let not_found = AppError::not_found("Script", 7);
        let illegal = AppError::IllegalTransition("already claimed".into());
        let forbidden = AppError::Authorization("wrong role".into());

        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(illegal.status_code(), StatusCode::CONFLICT);
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        assert_eq!(not_found.kind(), "not_found");
        assert_eq!(illegal.kind(), "illegal_transition");
        assert_eq!(forbidden.kind(), "authorization");
        assert_eq!(not_found.to_string(), "Script 7 not found");
    }

    #[test]
    fn test_provider_exhausted_keeps_last_error() {
        let err = AppError::ProviderExhausted {
            last_error: "OpenRouter API error (401): bad key".into(),
        };
        assert_eq!(
            err.to_string(),
            "All AI providers failed. Last error: OpenRouter API error (401): bad key"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
