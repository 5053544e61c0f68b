//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use std::borrow::Cow;

use axum::{
    extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl AppError {
    /// Código estable que los clientes usan para decidir si reintentar
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DB_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();

        let error_response = match self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: Some(json!({ "sql_error": e.to_string() })),
                    code,
                }
            }
            AppError::Validation(e) => {
                tracing::warn!("Validation error: {}", e);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("❌ Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: Some(json!({ "internal_error": msg })),
                    code,
                }
            }
            AppError::Unauthorized(msg) => simple("Unauthorized", msg, code),
            AppError::Forbidden(msg) => simple("Forbidden", msg, code),
            AppError::NotFound(msg) => simple("Not Found", msg, code),
            AppError::Conflict(msg) => simple("Conflict", msg, code),
            AppError::BadRequest(msg) => simple("Bad Request", msg, code),
            AppError::ServiceUnavailable(msg) => simple("Service Unavailable", msg, code),
        };

        (status, Json(error_response)).into_response()
    }
}

fn simple(error: &str, message: String, code: String) -> ErrorResponse {
    tracing::debug!("{} ({}): {}", error, code, message);
    ErrorResponse {
        error: error.to_string(),
        message,
        details: None,
        code,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            // Pool agotado o cerrado: el cliente puede reintentar
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::ServiceUnavailable(format!("database unavailable: {}", error))
            }
            other => AppError::Database(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // JSON bien formado con valores que no encajan (p. ej. enum desconocido)
            JsonRejection::JsonDataError(e) => validation_error("body", e.body_text()),
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        validation_error("query", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: impl Into<String>) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.message = Some(Cow::Owned(message.into()));

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de conflicto
pub fn conflict_error(message: impl Into<String>) -> AppError {
    AppError::Conflict(message.into())
}

/// Función helper para crear errores de acceso prohibido
pub fn forbidden_error(operation: &str, reason: &str) -> AppError {
    AppError::Forbidden(format!("Cannot {}: {}", operation, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_field() {
        let error = validation_error("vehicle_number", "vehicle number already registered");
        match error {
            AppError::Validation(errors) => {
                let fields = errors.field_errors();
                let field = fields.get("vehicle_number").expect("field present");
                assert_eq!(
                    field[0].message.as_deref(),
                    Some("vehicle number already registered")
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(conflict_error("taken").status_code(), StatusCode::CONFLICT);
        assert_eq!(not_found_error("Booking", 7).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            forbidden_error("assign", "admin only").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(not_found_error("Driver", 9).to_string(), "Not found: Driver with id '9' not found");
    }

    #[test]
    fn test_pool_exhaustion_is_service_unavailable() {
        let error: AppError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code(), "SERVICE_UNAVAILABLE");

        let error: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(error.code(), "DB_ERROR");
    }
}
