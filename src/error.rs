use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{config::ConfigError, validation::ValidationErrors};

/// AppError
///
/// The single error type returned by repositories, extractors and handlers.
/// Client-facing variants map to 4xx responses; everything else is logged and
/// surfaced as a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("This action is unauthorized.")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    pub fn song_not_found(id: i64) -> Self {
        Self::NotFound(format!("No song found with id {id}."))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Token(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// MessageResponse
///
/// Body of every non-validation error and of the update/delete confirmations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Validation(errors) => (status, Json(errors.into_response_body())).into_response(),
            AppError::NotFound(_) | AppError::Unauthenticated | AppError::Forbidden => {
                (status, Json(MessageResponse::new(self.to_string()))).into_response()
            }
            internal => {
                tracing::error!(error = %internal, "request failed");
                (status, Json(MessageResponse::new("Server Error"))).into_response()
            }
        }
    }
}
