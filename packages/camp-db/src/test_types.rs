//! Catálogo de tipos de exame

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::models::{new_id, TestType, TestTypeInput};

pub async fn list(pool: &SqlitePool) -> DbResult<Vec<TestType>> {
    let test_types = sqlx::query_as::<_, TestType>("SELECT * FROM test_types ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(test_types)
}

pub(crate) async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<TestType>> {
    let test_type = sqlx::query_as::<_, TestType>("SELECT * FROM test_types WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(test_type)
}

pub async fn get(pool: &SqlitePool, id: &str) -> DbResult<TestType> {
    let mut conn = pool.acquire().await?;
    find(&mut conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Tipo de exame".to_string()))
}

pub async fn create(pool: &SqlitePool, input: &TestTypeInput) -> DbResult<TestType> {
    let now = Utc::now();
    let test_type = sqlx::query_as::<_, TestType>(
        r#"
        INSERT INTO test_types (id, name, requires_result, requires_print_sheet, requires_barcode, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(input.name.trim())
    .bind(input.requires_result)
    .bind(input.requires_print_sheet)
    .bind(input.requires_barcode)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    info!("Tipo de exame criado: {} ({})", test_type.name, test_type.id);
    Ok(test_type)
}

pub async fn update(pool: &SqlitePool, id: &str, input: &TestTypeInput) -> DbResult<TestType> {
    sqlx::query_as::<_, TestType>(
        r#"
        UPDATE test_types
        SET name = ?, requires_result = ?, requires_print_sheet = ?, requires_barcode = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(input.requires_result)
    .bind(input.requires_print_sheet)
    .bind(input.requires_barcode)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound("Tipo de exame".to_string()))
}

/// Remove um tipo de exame; falha com conflito se já foi solicitado
pub async fn delete(pool: &SqlitePool, id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM test_types WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ConstraintViolation(_) => {
                DbError::Conflict("Tipo de exame em uso por atendimentos".to_string())
            }
            other => other,
        })?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("Tipo de exame".to_string()));
    }
    info!("Tipo de exame removido: {}", id);
    Ok(())
}
