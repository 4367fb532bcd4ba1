//! Utilidades de teste: banco SQLite temporário já migrado

use crate::{init_db_pool, DbConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Banco temporário; o diretório é removido quando o valor é descartado
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("diretório temporário");
        let db_path = dir.path().join("camp-test.db");
        let config = DbConfig {
            db_path: db_path.to_string_lossy().into_owned(),
            max_connections: 4,
        };
        let pool = init_db_pool(&config).await.expect("banco de teste");
        Self { pool, _dir: dir }
    }
}
