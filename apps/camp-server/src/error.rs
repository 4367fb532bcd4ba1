//! Erros da API e sua conversão em respostas HTTP
//!
//! Toda resposta de erro tem corpo `{"error": "..."}`. Falhas internas são
//! registradas no log e devolvidas com mensagem genérica.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use camp_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Estoque insuficiente. Disponível: {available}, solicitado: {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("Sistema em manutenção")]
    Maintenance,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(err) => {
                error!("Erro interno: {:#}", err);
                json!({ "error": "Erro interno do servidor" })
            }
            ApiError::InsufficientStock {
                available,
                requested,
            } => json!({
                "error": self.to_string(),
                "available": available,
                "requested": requested,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Validation(msg) => ApiError::BadRequest(msg),
            DbError::ConstraintViolation(msg) => ApiError::BadRequest(msg),
            DbError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::InsufficientStock {
                available,
                requested,
            } => ApiError::InsufficientStock {
                available,
                requested,
            },
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_db_errors_to_status() {
        let cases = [
            (DbError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DbError::NotFound("Paciente".into()), StatusCode::NOT_FOUND),
            (DbError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                DbError::InsufficientStock {
                    available: 1,
                    requested: 2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (DbError::QueryError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn not_found_keeps_resource_name() {
        let err = ApiError::from(DbError::NotFound("Atendimento".into()));
        assert_eq!(err.to_string(), "Atendimento não encontrado");
    }
}
