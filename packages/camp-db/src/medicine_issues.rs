//! Dispensação de medicamentos
//!
//! Itens do catálogo (`medicine_id` preenchido) movimentam o estoque:
//! - criação retira `quantity`
//! - alteração de quantidade retira ou devolve a diferença
//! - remoção devolve `quantity`
//!
//! Itens avulsos (só `custom_medicine`) não têm controle de estoque. Para itens
//! do catálogo `custom_medicine` guarda o nome do medicamento, que continua no
//! histórico se ele for removido do catálogo. Toda dispensação leva o
//! atendimento a `medicines_issued`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::models::{
    new_id, MedicineIssue, MedicineIssueDetail, MedicineIssueUpdate, NewMedicineIssue,
    PageRequest, Pagination, RegistrationStatus,
};
use crate::tx::WriteTx;
use crate::{medicines, registrations};

async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<MedicineIssue>> {
    let issue = sqlx::query_as::<_, MedicineIssue>("SELECT * FROM medicine_issues WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(issue)
}

async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<MedicineIssue> {
    find(conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Dispensação".to_string()))
}

async fn detail(
    conn: &mut SqliteConnection,
    medicine_issue: MedicineIssue,
) -> DbResult<MedicineIssueDetail> {
    let medicine = match &medicine_issue.medicine_id {
        Some(id) => medicines::find(conn, id).await?,
        None => None,
    };
    let registration = registrations::with_patient(conn, &medicine_issue.registration_id).await?;
    Ok(MedicineIssueDetail {
        medicine_issue,
        medicine,
        registration,
    })
}

/// Registra a dispensação, baixa o estoque e atualiza o status do atendimento
pub async fn create(pool: &SqlitePool, input: &NewMedicineIssue) -> DbResult<MedicineIssueDetail> {
    if input.quantity <= 0 {
        return Err(DbError::Validation(
            "Quantidade deve ser maior que zero".to_string(),
        ));
    }

    let medicine_id = input
        .medicine_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let custom_medicine = input
        .custom_medicine
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    if medicine_id.is_none() && custom_medicine.is_none() {
        return Err(DbError::Validation(
            "Informe o medicamento do catálogo ou o nome do medicamento avulso".to_string(),
        ));
    }

    let mut tx = WriteTx::begin(pool).await?;
    registrations::require(&mut tx, &input.registration_id).await?;

    // Item do catálogo: baixa o estoque e guarda o nome para o histórico
    let medicine_name = match medicine_id {
        Some(medicine_id) => {
            let medicine = medicines::find(&mut tx, medicine_id)
                .await?
                .ok_or_else(|| DbError::NotFound("Medicamento".to_string()))?;

            if let Err(err) = medicines::adjust_stock(&mut tx, &medicine, -input.quantity).await {
                warn!(
                    "Dispensação recusada: {} (estoque {}, pedido {})",
                    medicine.name, medicine.stock, input.quantity
                );
                return Err(err);
            }
            Some(medicine.name)
        }
        None => custom_medicine.map(str::to_string),
    };

    let issue = sqlx::query_as::<_, MedicineIssue>(
        r#"
        INSERT INTO medicine_issues (id, registration_id, medicine_id, custom_medicine, quantity,
                                     dosage, instructions, issued_by, issued_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.registration_id)
    .bind(medicine_id)
    .bind(medicine_name.as_deref())
    .bind(input.quantity)
    .bind(input.dosage.as_deref())
    .bind(input.instructions.as_deref())
    .bind(input.issued_by.as_deref())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    registrations::set_status(&mut tx, &input.registration_id, RegistrationStatus::MedicinesIssued)
        .await?;

    let detail = detail(&mut tx, issue).await?;
    tx.commit().await?;

    info!(
        "Dispensação {} registrada no atendimento {} ({} un.)",
        detail.medicine_issue.id, input.registration_id, input.quantity
    );
    Ok(detail)
}

pub async fn get(pool: &SqlitePool, id: &str) -> DbResult<MedicineIssueDetail> {
    let mut conn = pool.acquire().await?;
    let issue = require(&mut conn, id).await?;
    detail(&mut conn, issue).await
}

/// Altera a dispensação. Mudança de quantidade de item do catálogo movimenta
/// a diferença no estoque.
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    changes: &MedicineIssueUpdate,
) -> DbResult<MedicineIssueDetail> {
    if matches!(changes.quantity, Some(quantity) if quantity <= 0) {
        return Err(DbError::Validation(
            "Quantidade deve ser maior que zero".to_string(),
        ));
    }

    let mut tx = WriteTx::begin(pool).await?;
    let existing = require(&mut tx, id).await?;

    if let (Some(quantity), Some(medicine_id)) = (changes.quantity, &existing.medicine_id) {
        if let Some(medicine) = medicines::find(&mut tx, medicine_id).await? {
            let diff = quantity - existing.quantity;
            if diff != 0 {
                medicines::adjust_stock(&mut tx, &medicine, -diff).await?;
            }
        }
    }

    let updated = sqlx::query_as::<_, MedicineIssue>(
        r#"
        UPDATE medicine_issues SET
            quantity = COALESCE(?, quantity),
            dosage = COALESCE(?, dosage),
            instructions = COALESCE(?, instructions),
            issued_by = COALESCE(?, issued_by)
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(changes.quantity)
    .bind(changes.dosage.as_deref())
    .bind(changes.instructions.as_deref())
    .bind(changes.issued_by.as_deref())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    let detail = detail(&mut tx, updated).await?;
    tx.commit().await?;
    Ok(detail)
}

/// Remove a dispensação e devolve a quantidade ao estoque
pub async fn delete(pool: &SqlitePool, id: &str) -> DbResult<()> {
    let mut tx = WriteTx::begin(pool).await?;
    let existing = require(&mut tx, id).await?;

    if let Some(medicine_id) = &existing.medicine_id {
        if let Some(medicine) = medicines::find(&mut tx, medicine_id).await? {
            medicines::adjust_stock(&mut tx, &medicine, existing.quantity).await?;
        }
    }

    sqlx::query("DELETE FROM medicine_issues WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("Dispensação {} removida", id);
    Ok(())
}

/// Listagem paginada, mais recentes primeiro
pub async fn list(
    pool: &SqlitePool,
    registration_id: Option<&str>,
    page: PageRequest,
) -> DbResult<(Vec<MedicineIssueDetail>, Pagination)> {
    let mut conn = pool.acquire().await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM medicine_issues WHERE (?1 IS NULL OR registration_id = ?1)")
            .bind(registration_id)
            .fetch_one(&mut *conn)
            .await?;

    let rows = sqlx::query_as::<_, MedicineIssue>(
        r#"
        SELECT * FROM medicine_issues
        WHERE (?1 IS NULL OR registration_id = ?1)
        ORDER BY issued_at DESC, rowid DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(registration_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    let mut issues = Vec::with_capacity(rows.len());
    for row in rows {
        issues.push(detail(&mut conn, row).await?);
    }
    Ok((issues, Pagination::new(page.page, page.limit, total)))
}
