//! Pacientes: busca, prontuário e atualização cadastral

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::models::{contains_pattern, Patient, PatientRecord, PatientSummary, PatientUpdate};
use crate::registrations;

/// Quantidade de pacientes devolvida quando a busca está vazia
pub const RECENT_LIMIT: i64 = 50;
/// Quantidade máxima de resultados de uma busca por termo
pub const SEARCH_LIMIT: i64 = 10;

/// Busca por nome, telefone ou código (substring) ou ID exato de atendimento.
/// Sem termo, devolve os pacientes mais recentes.
pub async fn search(pool: &SqlitePool, query: Option<&str>) -> DbResult<Vec<PatientSummary>> {
    let mut conn = pool.acquire().await?;
    let term = query.map(str::trim).filter(|q| !q.is_empty());

    let patients = match term {
        None => {
            sqlx::query_as::<_, Patient>(
                "SELECT * FROM patients ORDER BY created_at DESC, rowid DESC LIMIT ?",
            )
            .bind(RECENT_LIMIT)
            .fetch_all(&mut *conn)
            .await?
        }
        Some(term) => {
            let pattern = contains_pattern(term);
            sqlx::query_as::<_, Patient>(
                r#"
                SELECT * FROM patients
                WHERE name LIKE ?1 ESCAPE '\'
                   OR contact_number LIKE ?1 ESCAPE '\'
                   OR id LIKE ?1 ESCAPE '\'
                   OR id IN (SELECT patient_id FROM registrations WHERE id = ?2)
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?3
                "#,
            )
            .bind(pattern)
            .bind(term)
            .bind(SEARCH_LIMIT)
            .fetch_all(&mut *conn)
            .await?
        }
    };

    let mut summaries = Vec::with_capacity(patients.len());
    for patient in patients {
        let mut registrations = Vec::new();
        for registration in registrations::of_patient(&mut conn, &patient.id).await? {
            registrations.push(registrations::with_tests(&mut conn, registration).await?);
        }
        summaries.push(PatientSummary {
            patient,
            registrations,
        });
    }
    Ok(summaries)
}

pub(crate) async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Patient>> {
    let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(patient)
}

/// Prontuário completo: atendimentos, exames, resultados e dispensações
pub async fn record(pool: &SqlitePool, id: &str) -> DbResult<PatientRecord> {
    let mut conn = pool.acquire().await?;
    let patient = find(&mut conn, id)
        .await?
        .ok_or_else(|| DbError::NotFound("Paciente".to_string()))?;

    let mut records = Vec::new();
    for registration in registrations::of_patient(&mut conn, &patient.id).await? {
        records.push(registrations::record(&mut conn, registration).await?);
    }
    Ok(PatientRecord {
        patient,
        registrations: records,
    })
}

/// Atualiza os campos informados; os demais permanecem
pub async fn update(pool: &SqlitePool, id: &str, changes: &PatientUpdate) -> DbResult<PatientRecord> {
    let result = sqlx::query(
        r#"
        UPDATE patients SET
            name = COALESCE(?, name),
            address = COALESCE(?, address),
            contact_number = COALESCE(?, contact_number),
            date_of_birth = COALESCE(?, date_of_birth),
            age = COALESCE(?, age),
            gender = COALESCE(?, gender),
            weight = COALESCE(?, weight),
            height = COALESCE(?, height),
            bmi = COALESCE(?, bmi),
            blood_pressure = COALESCE(?, blood_pressure),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.address.as_deref())
    .bind(changes.contact_number.as_deref())
    .bind(changes.date_of_birth)
    .bind(changes.age)
    .bind(changes.gender.as_deref())
    .bind(changes.weight)
    .bind(changes.height)
    .bind(changes.bmi)
    .bind(changes.blood_pressure.as_deref())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("Paciente".to_string()));
    }
    info!("Dados do paciente {} atualizados", id);
    record(pool, id).await
}
