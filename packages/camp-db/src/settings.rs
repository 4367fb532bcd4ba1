//! Configurações chave/valor do mutirão
//!
//! `create` recusa chaves existentes; `upsert` grava sempre, mantendo a
//! categoria anterior quando nenhuma é informada.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::models::{Setting, SettingWrite};
use crate::tx::WriteTx;

/// Categoria usada quando nenhuma é informada
pub const DEFAULT_CATEGORY: &str = "general";

/// Configurações agrupadas por categoria, com as linhas originais
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub settings: BTreeMap<String, BTreeMap<String, String>>,
    pub raw: Vec<Setting>,
}

impl SettingsView {
    pub fn new(raw: Vec<Setting>) -> Self {
        let mut settings: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for setting in &raw {
            settings
                .entry(setting.category.clone())
                .or_default()
                .insert(setting.key.clone(), setting.value.clone());
        }
        Self { settings, raw }
    }
}

fn check_key(key: &str) -> DbResult<()> {
    if key.trim().is_empty() {
        return Err(DbError::Validation("Chave é obrigatória".to_string()));
    }
    Ok(())
}

/// Lista configurações, opcionalmente filtradas por categoria e chave
pub async fn list(
    pool: &SqlitePool,
    category: Option<&str>,
    key: Option<&str>,
) -> DbResult<Vec<Setting>> {
    let settings = sqlx::query_as::<_, Setting>(
        r#"
        SELECT * FROM settings
        WHERE (?1 IS NULL OR category = ?1)
          AND (?2 IS NULL OR key = ?2)
        ORDER BY category, key
        "#,
    )
    .bind(category)
    .bind(key)
    .fetch_all(pool)
    .await?;
    Ok(settings)
}

pub async fn get(pool: &SqlitePool, key: &str) -> DbResult<Setting> {
    sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("Configuração".to_string()))
}

/// Categoria informada sem espaços; vazia conta como ausente
fn category_of(input: &SettingWrite) -> Option<&str> {
    input
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// Cria uma configuração nova; chave repetida resulta em conflito
pub async fn create(pool: &SqlitePool, input: &SettingWrite) -> DbResult<Setting> {
    check_key(&input.key)?;

    let result = sqlx::query_as::<_, Setting>(
        r#"
        INSERT INTO settings (key, value, category, updated_by, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.key)
    .bind(&input.value)
    .bind(category_of(input).unwrap_or(DEFAULT_CATEGORY))
    .bind(input.updated_by.as_deref())
    .bind(Utc::now())
    .fetch_one(pool)
    .await;

    match result {
        Ok(setting) => {
            info!("Configuração criada: {}", setting.key);
            Ok(setting)
        }
        Err(err) => match DbError::from(err) {
            DbError::Conflict(_) => Err(DbError::Conflict(
                "Configuração já existe. Use PUT para atualizar.".to_string(),
            )),
            other => Err(other),
        },
    }
}

async fn upsert_in(conn: &mut SqliteConnection, input: &SettingWrite) -> DbResult<Setting> {
    check_key(&input.key)?;

    let category = category_of(input);

    let setting = sqlx::query_as::<_, Setting>(
        r#"
        INSERT INTO settings (key, value, category, updated_by, updated_at)
        VALUES (?1, ?2, COALESCE(?3, ?4), ?5, ?6)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            category = COALESCE(?3, settings.category),
            updated_by = excluded.updated_by,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(&input.key)
    .bind(&input.value)
    .bind(category)
    .bind(DEFAULT_CATEGORY)
    .bind(input.updated_by.as_deref())
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(setting)
}

/// Grava a configuração, criando-a se ainda não existir
pub async fn upsert(pool: &SqlitePool, input: &SettingWrite) -> DbResult<Setting> {
    let mut conn = pool.acquire().await?;
    let setting = upsert_in(&mut conn, input).await?;
    info!("Configuração gravada: {} ({})", setting.key, setting.category);
    Ok(setting)
}

/// Grava várias configurações na mesma transação
pub async fn batch_upsert(pool: &SqlitePool, inputs: &[SettingWrite]) -> DbResult<Vec<Setting>> {
    let mut tx = WriteTx::begin(pool).await?;
    let mut settings = Vec::with_capacity(inputs.len());
    for input in inputs {
        settings.push(upsert_in(&mut tx, input).await?);
    }
    tx.commit().await?;

    info!("{} configurações atualizadas", settings.len());
    Ok(settings)
}

pub async fn delete(pool: &SqlitePool, key: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("Configuração".to_string()));
    }
    info!("Configuração removida: {}", key);
    Ok(())
}

/// Lê uma configuração numérica, com valor padrão se ausente ou inválida
pub async fn get_i64(pool: &SqlitePool, key: &str, default: i64) -> DbResult<i64> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDb;

    fn write(key: &str, value: &str, category: Option<&str>) -> SettingWrite {
        SettingWrite {
            key: key.to_string(),
            value: value.to_string(),
            category: category.map(str::to_string),
            updated_by: Some("admin".to_string()),
        }
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let db = TestDb::new().await;
        let created = create(&db.pool, &write("camp_name", "Mutirão", None)).await.unwrap();
        assert_eq!(created.category, DEFAULT_CATEGORY);

        let err = create(&db.pool, &write("camp_name", "Outro", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(get(&db.pool, "camp_name").await.unwrap().value, "Mutirão");
    }

    #[tokio::test]
    async fn blank_category_falls_back_to_default() {
        let db = TestDb::new().await;
        let created = create(&db.pool, &write("camp_location", "Praça", Some("  ")))
            .await
            .unwrap();
        assert_eq!(created.category, DEFAULT_CATEGORY);

        let trimmed = create(&db.pool, &write("email", "a@b.c", Some(" contact ")))
            .await
            .unwrap();
        assert_eq!(trimmed.category, "contact");

        let upserted = upsert(&db.pool, &write("camp_name", "Mutirão", Some("")))
            .await
            .unwrap();
        assert_eq!(upserted.category, DEFAULT_CATEGORY);
    }

    #[tokio::test]
    async fn upsert_always_succeeds_and_keeps_category() {
        let db = TestDb::new().await;
        let first = upsert(&db.pool, &write("low_stock_threshold", "10", Some("medical")))
            .await
            .unwrap();
        assert_eq!(first.category, "medical");

        let second = upsert(&db.pool, &write("low_stock_threshold", "5", None))
            .await
            .unwrap();
        assert_eq!(second.value, "5");
        assert_eq!(second.category, "medical");

        let third = upsert(&db.pool, &write("low_stock_threshold", "7", Some("pharmacy")))
            .await
            .unwrap();
        assert_eq!(third.category, "pharmacy");
        assert_eq!(get_i64(&db.pool, "low_stock_threshold", 10).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn batch_and_grouping() {
        let db = TestDb::new().await;
        batch_upsert(
            &db.pool,
            &[
                write("camp_name", "Mutirão", None),
                write("email", "contato@mutirao.org", None),
                write("low_stock_threshold", "10", Some("medical")),
            ],
        )
        .await
        .unwrap();

        let view = SettingsView::new(list(&db.pool, None, None).await.unwrap());
        assert_eq!(view.raw.len(), 3);
        assert_eq!(view.settings["general"].len(), 2);
        assert_eq!(view.settings["medical"]["low_stock_threshold"], "10");

        let medical = list(&db.pool, Some("medical"), None).await.unwrap();
        assert_eq!(medical.len(), 1);
        let by_key = list(&db.pool, None, Some("email")).await.unwrap();
        assert_eq!(by_key[0].value, "contato@mutirao.org");
    }

    #[tokio::test]
    async fn delete_and_missing_keys() {
        let db = TestDb::new().await;
        upsert(&db.pool, &write("email", "x@y.z", None)).await.unwrap();
        delete(&db.pool, "email").await.unwrap();

        assert!(matches!(get(&db.pool, "email").await, Err(DbError::NotFound(_))));
        assert!(matches!(delete(&db.pool, "email").await, Err(DbError::NotFound(_))));
        assert_eq!(get_i64(&db.pool, "email", 3).await.unwrap(), 3);
        assert!(matches!(
            create(&db.pool, &write("  ", "x", None)).await,
            Err(DbError::Validation(_))
        ));
    }
}
