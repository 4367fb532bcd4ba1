//! Definições de erro para a biblioteca camp-db
//!
//! Este módulo define os tipos de erro usados pelos repositórios

use thiserror::Error;

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("{0} não encontrado")]
    NotFound(String),

    #[error("Registro já existe: {0}")]
    Conflict(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Dados inválidos: {0}")]
    Validation(String),

    #[error("Estoque insuficiente. Disponível: {available}, solicitado: {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("Erro interno: {0}")]
    InternalError(String),
}

/// Resultado padrão dos repositórios
pub type DbResult<T> = Result<T, DbError>;

// Códigos estendidos do SQLite
const SQLITE_CONSTRAINT_CHECK: &str = "275";
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_NOTNULL: &str = "1299";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_BUSY: &str = "5";
const SQLITE_BUSY_SNAPSHOT: &str = "517";

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro".to_string()),
            sqlx::Error::Database(dbe) => {
                if let Some(code) = dbe.code() {
                    match code.as_ref() {
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY | "23000" => {
                            return DbError::Conflict(dbe.message().to_string());
                        }
                        SQLITE_CONSTRAINT_FOREIGNKEY
                        | SQLITE_CONSTRAINT_CHECK
                        | SQLITE_CONSTRAINT_NOTNULL => {
                            return DbError::ConstraintViolation(dbe.message().to_string());
                        }
                        // Esgotou o busy_timeout: outra escrita segurou a trava
                        SQLITE_BUSY | SQLITE_BUSY_SNAPSHOT => {
                            return DbError::Conflict(
                                "Banco de dados ocupado, tente novamente".to_string(),
                            );
                        }
                        _ => {}
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

impl From<validator::ValidationErrors> for DbError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DbError::Validation(errors.to_string())
    }
}
