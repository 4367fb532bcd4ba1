//! Resultados de exames e a transição para `tests_done`

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::models::{
    contains_pattern, new_id, NewTestResult, PageRequest, Pagination, PendingRegistration,
    Registration, RegistrationStatus, TestResult, TestResultDetail, TestResultStatus,
    TestResultUpdate,
};
use crate::{registrations, test_types};
use crate::tx::WriteTx;

/// Filtros da listagem de resultados
#[derive(Debug, Clone, Default)]
pub struct TestResultFilter {
    pub registration_id: Option<String>,
    pub test_type_id: Option<String>,
    pub status: Option<TestResultStatus>,
    /// Trecho do ID do atendimento, do nome do paciente ou do exame
    pub search: Option<String>,
}

/// Filtros da lista de pendências
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub test_type_id: Option<String>,
    pub search: Option<String>,
}

async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<TestResult>> {
    let result = sqlx::query_as::<_, TestResult>("SELECT * FROM test_results WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result)
}

async fn find_by_key(
    conn: &mut SqliteConnection,
    registration_id: &str,
    test_type_id: &str,
) -> DbResult<Option<TestResult>> {
    let result = sqlx::query_as::<_, TestResult>(
        "SELECT * FROM test_results WHERE registration_id = ? AND test_type_id = ?",
    )
    .bind(registration_id)
    .bind(test_type_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(result)
}

pub(crate) async fn detail(conn: &mut SqliteConnection, test_result: TestResult) -> DbResult<TestResultDetail> {
    let test_type = test_types::find(conn, &test_result.test_type_id)
        .await?
        .ok_or_else(|| DbError::NotFound("Tipo de exame".to_string()))?;
    let registration = registrations::with_patient(conn, &test_result.registration_id).await?;
    Ok(TestResultDetail {
        test_result,
        test_type,
        registration,
    })
}

/// Lança o resultado de um exame solicitado.
///
/// Quando o número de resultados do atendimento alcança o número de exames
/// solicitados, o atendimento passa a `tests_done` na mesma transação.
pub async fn create(pool: &SqlitePool, input: &NewTestResult) -> DbResult<TestResultDetail> {
    let mut tx = WriteTx::begin(pool).await?;

    registrations::require(&mut tx, &input.registration_id).await?;
    if test_types::find(&mut tx, &input.test_type_id).await?.is_none() {
        return Err(DbError::NotFound("Tipo de exame".to_string()));
    }

    // O exame precisa ter sido solicitado neste atendimento
    let ordered: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM registration_tests WHERE registration_id = ? AND test_type_id = ?",
    )
    .bind(&input.registration_id)
    .bind(&input.test_type_id)
    .fetch_optional(&mut *tx)
    .await?;
    if ordered.is_none() {
        warn!(
            "Resultado recusado: exame {} não solicitado no atendimento {}",
            input.test_type_id, input.registration_id
        );
        return Err(DbError::Validation(
            "Este exame não foi solicitado neste atendimento".to_string(),
        ));
    }

    // Um resultado por exame
    if find_by_key(&mut tx, &input.registration_id, &input.test_type_id)
        .await?
        .is_some()
    {
        return Err(DbError::Conflict(
            "Resultado já lançado. Use PUT para atualizar.".to_string(),
        ));
    }

    let test_result = sqlx::query_as::<_, TestResult>(
        r#"
        INSERT INTO test_results (id, registration_id, test_type_id, result, normal_range, status, entered_by, entered_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.registration_id)
    .bind(&input.test_type_id)
    .bind(&input.result)
    .bind(input.normal_range.as_deref())
    .bind(input.status.unwrap_or_default())
    .bind(input.entered_by.as_deref())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    // Todos os exames com resultado: atendimento passa a tests_done
    let (ordered, resulted): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM registration_tests WHERE registration_id = ?1),
            (SELECT COUNT(*) FROM test_results WHERE registration_id = ?1)
        "#,
    )
    .bind(&input.registration_id)
    .fetch_one(&mut *tx)
    .await?;

    if ordered == resulted {
        registrations::set_status(&mut tx, &input.registration_id, RegistrationStatus::TestsDone)
            .await?;
    }

    let detail = detail(&mut tx, test_result).await?;
    tx.commit().await?;

    info!(
        "Resultado lançado: atendimento {} exame {} ({}/{})",
        input.registration_id, input.test_type_id, resulted, ordered
    );
    Ok(detail)
}

pub async fn get(pool: &SqlitePool, id: &str) -> DbResult<TestResultDetail> {
    let mut conn = pool.acquire().await?;
    let test_result = find(&mut conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Resultado de exame".to_string()))?;
    detail(&mut conn, test_result).await
}

async fn apply_update(
    conn: &mut SqliteConnection,
    id: &str,
    changes: &TestResultUpdate,
) -> DbResult<TestResult> {
    let updated = sqlx::query_as::<_, TestResult>(
        r#"
        UPDATE test_results SET
            result = COALESCE(?, result),
            normal_range = COALESCE(?, normal_range),
            status = COALESCE(?, status),
            entered_by = COALESCE(?, entered_by),
            entered_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(changes.result.as_deref())
    .bind(changes.normal_range.as_deref())
    .bind(changes.status)
    .bind(changes.entered_by.as_deref())
    .bind(Utc::now())
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated)
}

/// Corrige um resultado; a data de lançamento é renovada
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    changes: &TestResultUpdate,
) -> DbResult<TestResultDetail> {
    let mut conn = pool.acquire().await?;
    if find(&mut conn, id).await?.is_none() {
        return Err(DbError::NotFound("Resultado de exame".to_string()));
    }
    let updated = apply_update(&mut conn, id, changes).await?;
    detail(&mut conn, updated).await
}

/// Corrige o resultado identificado pelo par (atendimento, exame)
pub async fn update_by_key(
    pool: &SqlitePool,
    registration_id: &str,
    test_type_id: &str,
    changes: &TestResultUpdate,
) -> DbResult<TestResultDetail> {
    let mut conn = pool.acquire().await?;
    let existing = find_by_key(&mut conn, registration_id, test_type_id)
        .await?
        .ok_or_else(|| DbError::NotFound("Resultado de exame".to_string()))?;
    let updated = apply_update(&mut conn, &existing.id, changes).await?;
    detail(&mut conn, updated).await
}

/// Remove um resultado. Sem resultados restantes, o atendimento volta a
/// `registered`.
pub async fn delete(pool: &SqlitePool, id: &str) -> DbResult<()> {
    let mut tx = WriteTx::begin(pool).await?;
    let existing = find(&mut tx, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Resultado de exame".to_string()))?;

    sqlx::query("DELETE FROM test_results WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM test_results WHERE registration_id = ?")
            .bind(&existing.registration_id)
            .fetch_one(&mut *tx)
            .await?;

    if remaining == 0 {
        registrations::set_status(&mut tx, &existing.registration_id, RegistrationStatus::Registered)
            .await?;
    }

    tx.commit().await?;
    info!("Resultado {} removido", id);
    Ok(())
}

const LIST_WHERE: &str = r#"
    FROM test_results tr
    JOIN registrations r ON r.id = tr.registration_id
    JOIN patients p ON p.id = r.patient_id
    JOIN test_types tt ON tt.id = tr.test_type_id
    WHERE (?1 IS NULL OR tr.registration_id = ?1)
      AND (?2 IS NULL OR tr.test_type_id = ?2)
      AND (?3 IS NULL OR tr.status = ?3)
      AND (?4 IS NULL OR r.id LIKE ?4 ESCAPE '\' OR p.name LIKE ?4 ESCAPE '\' OR tt.name LIKE ?4 ESCAPE '\')
"#;

/// Listagem paginada, mais recentes primeiro
pub async fn list(
    pool: &SqlitePool,
    filter: &TestResultFilter,
    page: PageRequest,
) -> DbResult<(Vec<TestResultDetail>, Pagination)> {
    let mut conn = pool.acquire().await?;
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(contains_pattern);

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", LIST_WHERE))
        .bind(filter.registration_id.as_deref())
        .bind(filter.test_type_id.as_deref())
        .bind(filter.status)
        .bind(search.as_deref())
        .fetch_one(&mut *conn)
        .await?;

    let rows = sqlx::query_as::<_, TestResult>(&format!(
        "SELECT tr.* {} ORDER BY tr.entered_at DESC, tr.rowid DESC LIMIT ?5 OFFSET ?6",
        LIST_WHERE
    ))
    .bind(filter.registration_id.as_deref())
    .bind(filter.test_type_id.as_deref())
    .bind(filter.status)
    .bind(search.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(detail(&mut conn, row).await?);
    }
    Ok((results, Pagination::new(page.page, page.limit, total)))
}

/// Atendimentos com exames solicitados ainda sem resultado
pub async fn pending(
    pool: &SqlitePool,
    filter: &PendingFilter,
    page: PageRequest,
) -> DbResult<(Vec<PendingRegistration>, Pagination)> {
    let mut conn = pool.acquire().await?;
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(contains_pattern);

    const PENDING_WHERE: &str = r#"
        FROM registrations r
        JOIN patients p ON p.id = r.patient_id
        WHERE EXISTS (
            SELECT 1 FROM registration_tests rt
            WHERE rt.registration_id = r.id
              AND (?1 IS NULL OR rt.test_type_id = ?1)
              AND NOT EXISTS (
                  SELECT 1 FROM test_results tr
                  WHERE tr.registration_id = rt.registration_id AND tr.test_type_id = rt.test_type_id
              )
        )
        AND (?2 IS NULL OR r.id LIKE ?2 ESCAPE '\' OR p.name LIKE ?2 ESCAPE '\')
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", PENDING_WHERE))
        .bind(filter.test_type_id.as_deref())
        .bind(search.as_deref())
        .fetch_one(&mut *conn)
        .await?;

    let registrations_page = sqlx::query_as::<_, Registration>(&format!(
        "SELECT r.* {} ORDER BY r.created_at DESC, r.rowid DESC LIMIT ?3 OFFSET ?4",
        PENDING_WHERE
    ))
    .bind(filter.test_type_id.as_deref())
    .bind(search.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    let mut pending = Vec::with_capacity(registrations_page.len());
    for registration in registrations_page {
        let record = registrations::with_patient(&mut conn, &registration.id).await?;
        let ordered = registrations::tests_for(&mut conn, &registration.id).await?;
        let completed_tests = registrations::results_for(&mut conn, &registration.id).await?;
        let pending_tests = ordered
            .into_iter()
            .filter(|ordered| {
                !completed_tests
                    .iter()
                    .any(|done| done.test_result.test_type_id == ordered.registration_test.test_type_id)
            })
            .collect();
        pending.push(PendingRegistration {
            id: registration.id,
            patient: record.patient,
            created_at: registration.created_at,
            status: registration.status,
            pending_tests,
            completed_tests,
        });
    }

    Ok((pending, Pagination::new(page.page, page.limit, total)))
}
