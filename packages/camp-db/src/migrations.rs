//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite.
//! Todas as datas são gravadas pela aplicação (RFC 3339, UTC) para que
//! comparações por intervalo funcionem como comparação de texto.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
pub(crate) const MIGRATIONS: &[&str] = &[
    // 001_registration_schema.sql
    r#"
    -- Pacientes, identificados pelo código legível (ex.: R2501001)
    CREATE TABLE IF NOT EXISTS patients (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        address TEXT NOT NULL DEFAULT '',
        contact_number TEXT NOT NULL DEFAULT '',
        date_of_birth DATE,
        age INTEGER,
        gender TEXT NOT NULL DEFAULT '',
        weight REAL,
        height REAL,
        bmi REAL,
        blood_pressure TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    -- Atendimentos (uma visita do paciente ao mutirão)
    CREATE TABLE IF NOT EXISTS registrations (
        id TEXT PRIMARY KEY NOT NULL,
        patient_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'registered'
            CHECK (status IN ('registered', 'tests_done', 'medicines_issued', 'completed')),
        qr_code TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    -- Catálogo de exames
    CREATE TABLE IF NOT EXISTS test_types (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        requires_result BOOLEAN NOT NULL DEFAULT 0,
        requires_print_sheet BOOLEAN NOT NULL DEFAULT 0,
        requires_barcode BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    -- Exames solicitados em um atendimento
    CREATE TABLE IF NOT EXISTS registration_tests (
        id TEXT PRIMARY KEY NOT NULL,
        registration_id TEXT NOT NULL,
        test_type_id TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        UNIQUE (registration_id, test_type_id),
        FOREIGN KEY (registration_id) REFERENCES registrations (id) ON DELETE CASCADE,
        FOREIGN KEY (test_type_id) REFERENCES test_types (id)
    );

    -- Resultados; só podem existir para exames solicitados
    CREATE TABLE IF NOT EXISTS test_results (
        id TEXT PRIMARY KEY NOT NULL,
        registration_id TEXT NOT NULL,
        test_type_id TEXT NOT NULL,
        result TEXT NOT NULL,
        normal_range TEXT,
        status TEXT NOT NULL DEFAULT 'normal'
            CHECK (status IN ('normal', 'abnormal', 'critical')),
        entered_by TEXT,
        entered_at TIMESTAMP NOT NULL,
        UNIQUE (registration_id, test_type_id),
        FOREIGN KEY (registration_id, test_type_id)
            REFERENCES registration_tests (registration_id, test_type_id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_registrations_patient_id ON registrations (patient_id);
    CREATE INDEX IF NOT EXISTS idx_registrations_created_at ON registrations (created_at);
    CREATE INDEX IF NOT EXISTS idx_registrations_status ON registrations (status);
    CREATE INDEX IF NOT EXISTS idx_registration_tests_test_type ON registration_tests (test_type_id);
    CREATE INDEX IF NOT EXISTS idx_test_results_entered_at ON test_results (entered_at);
    CREATE INDEX IF NOT EXISTS idx_test_results_status ON test_results (status);
    "#,

    // 002_pharmacy.sql
    r#"
    -- Catálogo de medicamentos com controle de estoque
    CREATE TABLE IF NOT EXISTS medicines (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        dosage TEXT NOT NULL DEFAULT '',
        stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );

    -- Dispensações; medicine_id nulo indica medicamento avulso (sem estoque)
    CREATE TABLE IF NOT EXISTS medicine_issues (
        id TEXT PRIMARY KEY NOT NULL,
        registration_id TEXT NOT NULL,
        medicine_id TEXT,
        custom_medicine TEXT,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        dosage TEXT,
        instructions TEXT,
        issued_by TEXT,
        issued_at TIMESTAMP NOT NULL,
        FOREIGN KEY (registration_id) REFERENCES registrations (id) ON DELETE CASCADE,
        FOREIGN KEY (medicine_id) REFERENCES medicines (id) ON DELETE SET NULL
    );

    CREATE INDEX IF NOT EXISTS idx_medicine_issues_registration_id ON medicine_issues (registration_id);
    CREATE INDEX IF NOT EXISTS idx_medicine_issues_medicine_id ON medicine_issues (medicine_id);
    CREATE INDEX IF NOT EXISTS idx_medicine_issues_issued_at ON medicine_issues (issued_at);
    "#,

    // 003_feedback_settings.sql
    r#"
    -- Pesquisa de satisfação (anônima)
    CREATE TABLE IF NOT EXISTS satisfaction_ratings (
        id TEXT PRIMARY KEY NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        feedback TEXT,
        created_at TIMESTAMP NOT NULL
    );

    -- Configurações chave/valor agrupadas por categoria
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'general',
        updated_by TEXT,
        updated_at TIMESTAMP NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_satisfaction_ratings_created_at ON satisfaction_ratings (created_at);
    CREATE INDEX IF NOT EXISTS idx_settings_category ON settings (category);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            error!("Erro ao obter versão do banco: {}", e);
            // Continuar mesmo assim, pois pode ser a primeira execução
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        // Pular migrações já aplicadas
        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        // Cada migração roda em sua própria transação
        let mut transaction = pool.begin().await.with_context(|| {
            format!("Falha ao iniciar transação para migração {}", migration_version)
        })?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        // Registrar a nova versão
        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction.commit().await.with_context(|| {
            format!("Falha ao confirmar transação para migração {}", migration_version)
        })?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;

        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for expected in [
            "patients",
            "registrations",
            "test_types",
            "registration_tests",
            "test_results",
            "medicines",
            "medicine_issues",
            "satisfaction_ratings",
            "settings",
        ] {
            assert!(tables.contains(&expected.to_string()), "tabela ausente: {expected}");
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let conn_options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("twice.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, MIGRATIONS.len() as i64);
        Ok(())
    }
}
