//! Modo de manutenção
//!
//! O sinalizador fica no arquivo de ambiente (`MAINTENANCE_MODE=`) e só vale
//! após reiniciar o serviço. Com ele ligado, as rotas `/api` respondem 503,
//! exceto as de manutenção.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::AppState;

pub const MAINTENANCE_KEY: &str = "MAINTENANCE_MODE";

/// Substitui a linha `MAINTENANCE_MODE=` do conteúdo ou a acrescenta ao final
pub fn rewrite_flag(content: &str, enabled: bool) -> String {
    let line = format!("{}={}", MAINTENANCE_KEY, enabled);
    let prefix = format!("{}=", MAINTENANCE_KEY);

    let mut found = false;
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|current| {
            if current.starts_with(&prefix) {
                found = true;
                line.clone()
            } else {
                current.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(String::new());
        lines.push("# Modo de manutenção".to_string());
        lines.push(line);
    }
    lines.join("\n")
}

/// Grava o sinalizador no arquivo de ambiente, criando-o se necessário
pub async fn persist_flag(env_file: &Path, enabled: bool) -> anyhow::Result<()> {
    let content = match tokio::fs::read_to_string(env_file).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };

    tokio::fs::write(env_file, rewrite_flag(&content, enabled)).await?;
    info!(
        "Modo de manutenção {} em {} (requer reinício)",
        if enabled { "ativado" } else { "desativado" },
        env_file.display()
    );
    Ok(())
}

fn is_blocked(path: &str) -> bool {
    path.starts_with("/api") && !path.starts_with("/api/maintenance")
}

/// Middleware que recusa as chamadas da API enquanto o serviço está em manutenção
pub async fn guard<B>(State(state): State<AppState>, request: Request<B>, next: Next<B>) -> Response {
    if state.config.maintenance_mode && is_blocked(request.uri().path()) {
        warn!("Requisição recusada em manutenção: {}", request.uri().path());
        return ApiError::Maintenance.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn replaces_existing_line() {
        let content = "DATABASE_PATH=data/camp.db\nMAINTENANCE_MODE=false\nLOG_FORMAT=json";
        assert_eq!(
            rewrite_flag(content, true),
            "DATABASE_PATH=data/camp.db\nMAINTENANCE_MODE=true\nLOG_FORMAT=json"
        );
    }

    #[test]
    fn appends_when_missing() {
        assert_eq!(
            rewrite_flag("CAMP_SEED=true", false),
            "CAMP_SEED=true\n\n# Modo de manutenção\nMAINTENANCE_MODE=false"
        );
    }

    #[test]
    fn only_api_routes_are_blocked() {
        assert!(is_blocked("/api/patients/search"));
        assert!(!is_blocked("/api/maintenance"));
        assert!(!is_blocked("/api/maintenance/disable"));
        assert!(!is_blocked("/health"));
    }

    #[tokio::test]
    async fn persists_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");

        assert_ok!(persist_flag(&env_file, true).await);
        assert_ok!(persist_flag(&env_file, false).await);

        let content = tokio::fs::read_to_string(&env_file).await.unwrap();
        assert_eq!(content.matches("MAINTENANCE_MODE=").count(), 1);
        assert!(content.ends_with("MAINTENANCE_MODE=false"));
    }
}
