//! Catálogo de medicamentos e operações de estoque

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::models::{new_id, Medicine, MedicineInput};

pub async fn list(pool: &SqlitePool) -> DbResult<Vec<Medicine>> {
    let medicines = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(medicines)
}

pub(crate) async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Medicine>> {
    let medicine = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(medicine)
}

pub async fn get(pool: &SqlitePool, id: &str) -> DbResult<Medicine> {
    let mut conn = pool.acquire().await?;
    find(&mut conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Medicamento".to_string()))
}

pub async fn create(pool: &SqlitePool, input: &MedicineInput) -> DbResult<Medicine> {
    let now = Utc::now();
    let medicine = sqlx::query_as::<_, Medicine>(
        r#"
        INSERT INTO medicines (id, name, dosage, stock, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(input.name.trim())
    .bind(&input.dosage)
    .bind(input.stock)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    info!(
        "Medicamento cadastrado: {} {} (estoque {})",
        medicine.name, medicine.dosage, medicine.stock
    );
    Ok(medicine)
}

pub async fn update(pool: &SqlitePool, id: &str, input: &MedicineInput) -> DbResult<Medicine> {
    sqlx::query_as::<_, Medicine>(
        r#"
        UPDATE medicines
        SET name = ?, dosage = ?, stock = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.dosage)
    .bind(input.stock)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound("Medicamento".to_string()))
}

/// Remove o medicamento; dispensações antigas passam a ser itens sem catálogo
pub async fn delete(pool: &SqlitePool, id: &str) -> DbResult<()> {
    let result = sqlx::query("DELETE FROM medicines WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("Medicamento".to_string()));
    }
    info!("Medicamento removido: {}", id);
    Ok(())
}

/// Ajusta o estoque em `delta` unidades (negativo retira).
///
/// Retirar mais do que o disponível falha com `InsufficientStock`, sem alterar
/// o estoque. Deve ser chamada dentro da transação da operação que a motivou.
pub(crate) async fn adjust_stock(
    conn: &mut SqliteConnection,
    medicine: &Medicine,
    delta: i64,
) -> DbResult<i64> {
    if delta < 0 && medicine.stock < -delta {
        return Err(DbError::InsufficientStock {
            available: medicine.stock,
            requested: -delta,
        });
    }

    let stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE medicines
        SET stock = stock + ?, updated_at = ?
        WHERE id = ? AND stock + ? >= 0
        RETURNING stock
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(&medicine.id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    stock.ok_or(DbError::InsufficientStock {
        available: medicine.stock,
        requested: -delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDb;

    fn paracetamol(stock: i64) -> MedicineInput {
        MedicineInput {
            name: "Paracetamol".to_string(),
            dosage: "500mg".to_string(),
            stock,
        }
    }

    #[tokio::test]
    async fn crud_round() {
        let db = TestDb::new().await;
        let created = create(&db.pool, &paracetamol(100)).await.unwrap();
        assert_eq!(created.stock, 100);

        let updated = update(
            &db.pool,
            &created.id,
            &MedicineInput {
                stock: 80,
                ..paracetamol(0)
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.stock, 80);
        assert_eq!(get(&db.pool, &created.id).await.unwrap().stock, 80);

        delete(&db.pool, &created.id).await.unwrap();
        assert!(matches!(get(&db.pool, &created.id).await, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn adjust_stock_never_goes_negative() {
        let db = TestDb::new().await;
        let medicine = create(&db.pool, &paracetamol(5)).await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();

        let err = adjust_stock(&mut conn, &medicine, -6).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock {
                available: 5,
                requested: 6
            }
        ));

        assert_eq!(adjust_stock(&mut conn, &medicine, -5).await.unwrap(), 0);
        let medicine = find(&mut conn, &medicine.id).await.unwrap().unwrap();
        assert_eq!(adjust_stock(&mut conn, &medicine, 3).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn negative_stock_is_rejected_by_schema() {
        let db = TestDb::new().await;
        let err = create(&db.pool, &paracetamol(-1)).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)), "{err:?}");
    }
}
