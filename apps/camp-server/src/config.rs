//! Configuração do serviço lida de variáveis de ambiente
//!
//! `main` carrega o arquivo `.env` com `dotenvy` antes de chamar
//! [`AppConfig::from_env`].

use anyhow::{Context, Result};
use camp_db::DbConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Formato da saída de logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub database: DbConfig,
    /// Arquivo reescrito pelos endpoints de manutenção
    pub env_file: PathBuf,
    /// Modo de manutenção lido na inicialização
    pub maintenance_mode: bool,
    /// Insere tipos de exame, medicamentos e configurações padrão
    pub seed: bool,
    pub log_format: LogFormat,
    pub max_concurrent_requests: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database: DbConfig::default(),
            env_file: PathBuf::from(".env"),
            maintenance_mode: false,
            seed: true,
            log_format: LogFormat::Text,
            max_concurrent_requests: 256,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Monta a configuração a partir de uma função de consulta de variáveis
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let addr = match var("CAMP_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("CAMP_ADDR inválido: {}", raw))?,
            None => defaults.addr,
        };

        let max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {}", raw))?,
            None => defaults.database.max_connections,
        };

        let max_concurrent_requests = match var("MAX_CONCURRENT_REQUESTS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MAX_CONCURRENT_REQUESTS inválido: {}", raw))?,
            None => defaults.max_concurrent_requests,
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => anyhow::bail!("LOG_FORMAT inválido: {} (use text ou json)", other),
        };

        Ok(Self {
            addr,
            database: DbConfig {
                db_path: var("DATABASE_PATH").unwrap_or(defaults.database.db_path),
                max_connections,
            },
            env_file: var("CAMP_ENV_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.env_file),
            maintenance_mode: var("MAINTENANCE_MODE")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.maintenance_mode),
            seed: var("CAMP_SEED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.seed),
            log_format,
            max_concurrent_requests,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.database.db_path, "data/camp.db");
        assert_eq!(config.env_file, PathBuf::from(".env"));
        assert!(!config.maintenance_mode);
        assert!(config.seed);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CAMP_ADDR", "127.0.0.1:8080"),
            ("DATABASE_PATH", "/tmp/camp.db"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("MAINTENANCE_MODE", "TRUE"),
            ("CAMP_SEED", "false"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.database.max_connections, 2);
        assert!(config.maintenance_mode);
        assert!(!config.seed);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("CAMP_ADDR", "porta")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
