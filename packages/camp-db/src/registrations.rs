//! Atendimentos: cadastro, consulta e transições de status
//!
//! O status avança como efeito colateral de outras operações:
//! - `tests_done` quando todos os exames solicitados têm resultado
//! - `medicines_issued` sempre que um medicamento é dispensado
//! - volta a `registered` quando o último resultado é removido

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::ids;
use crate::models::{
    new_id, Medicine, MedicineIssue, MedicineIssueView, NewRegistration, Patient, Registration,
    RegistrationDetail, RegistrationRecord, RegistrationStatus, RegistrationTest,
    RegistrationTestView, RegistrationWithPatient, RegistrationWithTests, TestResult,
    TestResultView, TestType,
};
use crate::tx::WriteTx;

/// Identificadores devolvidos após o cadastro
#[derive(Debug, Clone)]
pub struct CreatedRegistration {
    pub registration_id: String,
    pub patient_id: String,
}

/// Cadastra o paciente com código legível, abre o atendimento e registra os
/// exames solicitados, tudo na mesma transação.
pub async fn create(pool: &SqlitePool, input: &NewRegistration) -> DbResult<CreatedRegistration> {
    let now = Utc::now();
    let mut tx = WriteTx::begin(pool).await?;

    // Remove exames repetidos e confere se todos existem
    let mut selected = input.selected_tests.clone();
    selected.sort();
    selected.dedup();

    if !selected.is_empty() {
        let mut missing = Vec::new();
        for test_type_id in &selected {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM test_types WHERE id = ?")
                .bind(test_type_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                missing.push(test_type_id.as_str());
            }
        }
        if !missing.is_empty() {
            warn!("Cadastro com tipos de exame inexistentes: {:?}", missing);
            return Err(DbError::Validation(format!(
                "IDs de tipo de exame inválidos: {}",
                missing.join(", ")
            )));
        }
    }

    // Código legível calculado sob a trava de escrita
    let patient_id = ids::next_patient_id(&mut tx, now).await?;

    sqlx::query(
        r#"
        INSERT INTO patients (id, name, address, contact_number, date_of_birth, age, gender,
                              weight, height, bmi, blood_pressure, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&patient_id)
    .bind(input.name.trim())
    .bind(&input.address)
    .bind(&input.contact_number)
    .bind(input.date_of_birth)
    .bind(input.age)
    .bind(&input.gender)
    .bind(input.weight)
    .bind(input.height)
    .bind(input.bmi)
    .bind(&input.blood_pressure)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // Abre o atendimento
    let registration_id = new_id();
    sqlx::query(
        "INSERT INTO registrations (id, patient_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&registration_id)
    .bind(&patient_id)
    .bind(RegistrationStatus::Registered)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // Exames solicitados
    for test_type_id in &selected {
        sqlx::query(
            "INSERT INTO registration_tests (id, registration_id, test_type_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&registration_id)
        .bind(test_type_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        "Paciente {} cadastrado (atendimento {}, {} exames)",
        patient_id,
        registration_id,
        selected.len()
    );
    Ok(CreatedRegistration {
        registration_id,
        patient_id,
    })
}

pub(crate) async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Registration>> {
    let registration = sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(registration)
}

pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<Registration> {
    find(conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Atendimento".to_string()))
}

pub async fn get(pool: &SqlitePool, id: &str) -> DbResult<Registration> {
    let mut conn = pool.acquire().await?;
    require(&mut conn, id).await
}

/// Grava o novo status do atendimento
pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: RegistrationStatus,
) -> DbResult<()> {
    sqlx::query("UPDATE registrations SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    info!("Atendimento {} -> {}", id, status);
    Ok(())
}

/// Busca pelo código do paciente (atendimento mais recente) ou pelo ID do
/// atendimento.
pub async fn lookup(pool: &SqlitePool, id: &str) -> DbResult<RegistrationDetail> {
    let mut conn = pool.acquire().await?;

    let by_patient = sqlx::query_as::<_, Registration>(
        "SELECT * FROM registrations WHERE patient_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let registration = match by_patient {
        Some(registration) => registration,
        None => require(&mut conn, id).await?,
    };

    let patient = patient_of(&mut conn, &registration).await?;
    let registration_tests = tests_for(&mut conn, &registration.id).await?;
    Ok(RegistrationDetail {
        registration,
        patient,
        registration_tests,
    })
}

/// Atendimento com o paciente
pub(crate) async fn with_patient(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<RegistrationWithPatient> {
    let registration = require(conn, id).await?;
    let patient = patient_of(conn, &registration).await?;
    Ok(RegistrationWithPatient {
        registration,
        patient,
    })
}

async fn patient_of(conn: &mut SqliteConnection, registration: &Registration) -> DbResult<Patient> {
    sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(&registration.patient_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::NotFound("Paciente".to_string()))
}

/// Guarda a data-URL do QR code gerado para o atendimento
pub async fn store_qr_code(pool: &SqlitePool, id: &str, qr_code: &str) -> DbResult<()> {
    sqlx::query("UPDATE registrations SET qr_code = ? WHERE id = ?")
        .bind(qr_code)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_with_patient(pool: &SqlitePool, id: &str) -> DbResult<RegistrationWithPatient> {
    let mut conn = pool.acquire().await?;
    with_patient(&mut conn, id).await
}

// ---------------------------------------------------------------------------
// Carregamento das visões compostas
// ---------------------------------------------------------------------------

async fn test_types_by_id(
    conn: &mut SqliteConnection,
    registration_id: &str,
) -> DbResult<HashMap<String, TestType>> {
    let test_types = sqlx::query_as::<_, TestType>(
        r#"
        SELECT tt.* FROM test_types tt
        WHERE tt.id IN (SELECT test_type_id FROM registration_tests WHERE registration_id = ?)
        "#,
    )
    .bind(registration_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(test_types.into_iter().map(|t| (t.id.clone(), t)).collect())
}

/// Exames solicitados no atendimento, com o tipo de exame
pub(crate) async fn tests_for(
    conn: &mut SqliteConnection,
    registration_id: &str,
) -> DbResult<Vec<RegistrationTestView>> {
    let rows = sqlx::query_as::<_, RegistrationTest>(
        "SELECT * FROM registration_tests WHERE registration_id = ? ORDER BY created_at, rowid",
    )
    .bind(registration_id)
    .fetch_all(&mut *conn)
    .await?;

    let test_types = test_types_by_id(conn, registration_id).await?;
    Ok(rows
        .into_iter()
        .filter_map(|registration_test| {
            test_types
                .get(&registration_test.test_type_id)
                .cloned()
                .map(|test_type| RegistrationTestView {
                    registration_test,
                    test_type,
                })
        })
        .collect())
}

/// Resultados já lançados no atendimento
pub(crate) async fn results_for(
    conn: &mut SqliteConnection,
    registration_id: &str,
) -> DbResult<Vec<TestResultView>> {
    let rows = sqlx::query_as::<_, TestResult>(
        "SELECT * FROM test_results WHERE registration_id = ? ORDER BY entered_at, rowid",
    )
    .bind(registration_id)
    .fetch_all(&mut *conn)
    .await?;

    let test_types = test_types_by_id(conn, registration_id).await?;
    Ok(rows
        .into_iter()
        .filter_map(|test_result| {
            test_types
                .get(&test_result.test_type_id)
                .cloned()
                .map(|test_type| TestResultView {
                    test_result,
                    test_type,
                })
        })
        .collect())
}

/// Medicamentos dispensados no atendimento
pub(crate) async fn issues_for(
    conn: &mut SqliteConnection,
    registration_id: &str,
) -> DbResult<Vec<MedicineIssueView>> {
    let rows = sqlx::query_as::<_, MedicineIssue>(
        "SELECT * FROM medicine_issues WHERE registration_id = ? ORDER BY issued_at, rowid",
    )
    .bind(registration_id)
    .fetch_all(&mut *conn)
    .await?;

    let medicines = sqlx::query_as::<_, Medicine>(
        r#"
        SELECT m.* FROM medicines m
        WHERE m.id IN (SELECT medicine_id FROM medicine_issues WHERE registration_id = ?)
        "#,
    )
    .bind(registration_id)
    .fetch_all(&mut *conn)
    .await?;
    let medicines: HashMap<String, Medicine> =
        medicines.into_iter().map(|m| (m.id.clone(), m)).collect();

    Ok(rows
        .into_iter()
        .map(|medicine_issue| {
            let medicine = medicine_issue
                .medicine_id
                .as_ref()
                .and_then(|id| medicines.get(id).cloned());
            MedicineIssueView {
                medicine_issue,
                medicine,
            }
        })
        .collect())
}

/// Atendimento com exames solicitados
pub(crate) async fn with_tests(
    conn: &mut SqliteConnection,
    registration: Registration,
) -> DbResult<RegistrationWithTests> {
    let registration_tests = tests_for(conn, &registration.id).await?;
    Ok(RegistrationWithTests {
        registration,
        registration_tests,
    })
}

/// Atendimento completo
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    registration: Registration,
) -> DbResult<RegistrationRecord> {
    let registration_tests = tests_for(conn, &registration.id).await?;
    let test_results = results_for(conn, &registration.id).await?;
    let medicine_issues = issues_for(conn, &registration.id).await?;
    Ok(RegistrationRecord {
        registration,
        registration_tests,
        test_results,
        medicine_issues,
    })
}

/// Atendimentos do paciente, do mais antigo para o mais recente
pub(crate) async fn of_patient(
    conn: &mut SqliteConnection,
    patient_id: &str,
) -> DbResult<Vec<Registration>> {
    let registrations = sqlx::query_as::<_, Registration>(
        "SELECT * FROM registrations WHERE patient_id = ? ORDER BY created_at, rowid",
    )
    .bind(patient_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(registrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestTypeInput;
    use crate::test_types;
    use crate::testing::TestDb;

    async fn seed_test_type(pool: &SqlitePool, name: &str) -> String {
        test_types::create(
            pool,
            &TestTypeInput {
                name: name.to_string(),
                requires_result: true,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    fn patient(name: &str, tests: Vec<String>) -> NewRegistration {
        NewRegistration {
            name: name.to_string(),
            gender: "female".to_string(),
            age: Some(40),
            selected_tests: tests,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_patient_with_readable_sequential_ids() {
        let db = TestDb::new().await;
        let first = create(&db.pool, &patient("Ana", vec![])).await.unwrap();
        let second = create(&db.pool, &patient("Bia", vec![])).await.unwrap();

        let prefix = ids::month_prefix(Utc::now().date_naive());
        assert_eq!(first.patient_id, format!("{prefix}001"));
        assert_eq!(second.patient_id, format!("{prefix}002"));

        let registration = get(&db.pool, &first.registration_id).await.unwrap();
        assert_eq!(registration.status, RegistrationStatus::Registered);
        assert_eq!(registration.patient_id, first.patient_id);
    }

    #[tokio::test]
    async fn records_selected_tests() {
        let db = TestDb::new().await;
        let rbs = seed_test_type(&db.pool, "RBS").await;
        let fbs = seed_test_type(&db.pool, "FBS").await;

        let created = create(&db.pool, &patient("Ana", vec![rbs.clone(), fbs.clone()]))
            .await
            .unwrap();
        let detail = lookup(&db.pool, &created.registration_id).await.unwrap();
        assert_eq!(detail.registration_tests.len(), 2);
        assert_eq!(detail.patient.name, "Ana");
    }

    #[tokio::test]
    async fn unknown_test_type_rolls_back_everything() {
        let db = TestDb::new().await;
        let err = create(&db.pool, &patient("Ana", vec!["missing".to_string()]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let patients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(patients, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_get_distinct_ids() {
        let db = TestDb::new().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = db.pool.clone();
                tokio::spawn(async move {
                    create(&pool, &patient(&format!("Paciente {i}"), vec![])).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().patient_id);
        }
        ids.sort();

        let prefix = ids::month_prefix(Utc::now().date_naive());
        let expected: Vec<String> = (1..=8).map(|n| format!("{prefix}{n:03}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn lookup_accepts_patient_id_or_registration_id() {
        let db = TestDb::new().await;
        let created = create(&db.pool, &patient("Ana", vec![])).await.unwrap();

        let by_patient = lookup(&db.pool, &created.patient_id).await.unwrap();
        assert_eq!(by_patient.registration.id, created.registration_id);

        let by_registration = lookup(&db.pool, &created.registration_id).await.unwrap();
        assert_eq!(by_registration.patient.id, created.patient_id);

        assert!(matches!(
            lookup(&db.pool, "R0000000").await,
            Err(DbError::NotFound(_))
        ));
    }
}
