//! Relatórios agregados do mutirão
//!
//! Cada relatório aceita um intervalo de datas opcional aplicado à coluna de
//! data própria de cada tabela (`created_at`, `issued_at`, `entered_at`).
//! As séries diárias agrupam pelo dia UTC e trazem no máximo 30 dias.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::error::{DbError, DbResult};
use crate::models::{
    Medicine, RegistrationStatus, RegistrationWithPatient, SatisfactionRating, TestResult,
    TestResultDetail,
};
use crate::{registrations, settings, test_results};

/// Chave da configuração com o limite de estoque baixo
pub const LOW_STOCK_SETTING: &str = "low_stock_threshold";
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

const DAYS_LIMIT: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Overview,
    Patients,
    Medicines,
    Tests,
    Satisfaction,
}

impl FromStr for ReportKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(ReportKind::Overview),
            "patients" => Ok(ReportKind::Patients),
            "medicines" => Ok(ReportKind::Medicines),
            "tests" => Ok(ReportKind::Tests),
            "satisfaction" => Ok(ReportKind::Satisfaction),
            other => Err(DbError::Validation(format!(
                "Tipo de relatório inválido: {}",
                other
            ))),
        }
    }
}

/// Intervalo fechado `[start, end]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Aceita `YYYY-MM-DD` ou RFC 3339. Uma data final sem horário inclui o
    /// dia inteiro.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> DbResult<Self> {
        let start = match non_empty(start) {
            Some(raw) => Some(parse_bound(raw, false)?),
            None => None,
        };
        let end = match non_empty(end) {
            Some(raw) => Some(parse_bound(raw, true)?),
            None => None,
        };
        Ok(Self { start, end })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bound(raw: &str, end_of_day: bool) -> DbResult<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        }
        .ok_or_else(|| DbError::InternalError("Horário inválido".to_string()))?;
        return Ok(date.and_time(time).and_utc());
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::Validation(format!("Data inválida: {}", raw)))
}

// ---------------------------------------------------------------------------
// Linhas agregadas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: RegistrationStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GenderCount {
    pub gender: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupCount {
    pub age_group: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuantity {
    pub date: String,
    pub count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyRating {
    pub date: String,
    pub avg_rating: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PatientVisits {
    pub id: String,
    pub name: String,
    pub visits: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MedicineUsage {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub issue_count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TestTypeUsage {
    pub id: String,
    pub name: String,
    pub result_count: i64,
    pub assigned_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingCount {
    pub rating: i64,
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Relatórios
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewSummary {
    pub total_patients: i64,
    pub total_registrations: i64,
    pub total_medicine_issues: i64,
    pub total_test_results: i64,
    pub total_satisfaction_ratings: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    pub summary: OverviewSummary,
    pub registrations_by_status: Vec<StatusCount>,
    pub recent_registrations: Vec<RegistrationWithPatient>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientsReport {
    pub patients_by_gender: Vec<GenderCount>,
    pub patients_by_age_group: Vec<AgeGroupCount>,
    pub patients_over_time: Vec<DailyCount>,
    pub top_patients_by_visits: Vec<PatientVisits>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicinesReport {
    pub medicine_stock_levels: Vec<Medicine>,
    pub top_issued_medicines: Vec<MedicineUsage>,
    pub medicine_issues_over_time: Vec<DailyQuantity>,
    pub low_stock_medicines: Vec<Medicine>,
    pub low_stock_threshold: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRate {
    pub total_registrations_with_tests: i64,
    pub registrations_with_results: i64,
    /// Percentual com duas casas decimais
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestsReport {
    pub test_type_usage: Vec<TestTypeUsage>,
    pub test_results_over_time: Vec<DailyCount>,
    pub abnormal_results: Vec<TestResultDetail>,
    pub test_completion_rate: CompletionRate,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfactionStats {
    pub average_rating: f64,
    pub total_ratings: i64,
    pub min_rating: i64,
    pub max_rating: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfactionReport {
    pub satisfaction_stats: SatisfactionStats,
    pub rating_distribution: Vec<RatingCount>,
    pub satisfaction_over_time: Vec<DailyRating>,
    pub recent_feedback: Vec<SatisfactionRating>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    Overview(OverviewReport),
    Patients(PatientsReport),
    Medicines(MedicinesReport),
    Tests(TestsReport),
    Satisfaction(SatisfactionReport),
}

pub async fn generate(pool: &SqlitePool, kind: ReportKind, range: &DateRange) -> DbResult<Report> {
    let report = match kind {
        ReportKind::Overview => Report::Overview(overview(pool, range).await?),
        ReportKind::Patients => Report::Patients(patients(pool, range).await?),
        ReportKind::Medicines => Report::Medicines(medicines(pool, range).await?),
        ReportKind::Tests => Report::Tests(tests(pool, range).await?),
        ReportKind::Satisfaction => Report::Satisfaction(satisfaction(pool, range).await?),
    };
    Ok(report)
}

async fn count_between(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    range: &DateRange,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE (?1 IS NULL OR {column} >= ?1) AND (?2 IS NULL OR {column} <= ?2)"
    ))
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn overview(pool: &SqlitePool, range: &DateRange) -> DbResult<OverviewReport> {
    let summary = OverviewSummary {
        total_patients: count_between(pool, "patients", "created_at", range).await?,
        total_registrations: count_between(pool, "registrations", "created_at", range).await?,
        total_medicine_issues: count_between(pool, "medicine_issues", "issued_at", range).await?,
        total_test_results: count_between(pool, "test_results", "entered_at", range).await?,
        total_satisfaction_ratings: count_between(pool, "satisfaction_ratings", "created_at", range)
            .await?,
    };

    let registrations_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count FROM registrations
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let recent_ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM registrations
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        ORDER BY created_at DESC, rowid DESC
        LIMIT 10
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let mut conn = pool.acquire().await?;
    let mut recent_registrations = Vec::with_capacity(recent_ids.len());
    for id in &recent_ids {
        recent_registrations.push(registrations::with_patient(&mut conn, id).await?);
    }

    Ok(OverviewReport {
        summary,
        registrations_by_status,
        recent_registrations,
    })
}

pub async fn patients(pool: &SqlitePool, range: &DateRange) -> DbResult<PatientsReport> {
    let patients_by_gender = sqlx::query_as::<_, GenderCount>(
        r#"
        SELECT gender, COUNT(*) AS count FROM patients
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        GROUP BY gender
        ORDER BY count DESC, gender
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    // Idade desconhecida fica em grupo próprio
    let patients_by_age_group = sqlx::query_as::<_, AgeGroupCount>(
        r#"
        SELECT age_group, COUNT(*) AS count FROM (
            SELECT CASE
                WHEN age IS NULL THEN 'Unknown'
                WHEN age < 18 THEN 'Under 18'
                WHEN age BETWEEN 18 AND 30 THEN '18-30'
                WHEN age BETWEEN 31 AND 50 THEN '31-50'
                WHEN age BETWEEN 51 AND 70 THEN '51-70'
                ELSE 'Over 70'
            END AS age_group
            FROM patients
            WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        )
        GROUP BY age_group
        ORDER BY CASE age_group
            WHEN 'Under 18' THEN 1
            WHEN '18-30' THEN 2
            WHEN '31-50' THEN 3
            WHEN '51-70' THEN 4
            WHEN 'Over 70' THEN 5
            ELSE 6
        END
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let patients_over_time = sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT substr(created_at, 1, 10) AS date, COUNT(*) AS count FROM patients
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        GROUP BY date
        ORDER BY date DESC
        LIMIT ?3
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .bind(DAYS_LIMIT)
    .fetch_all(pool)
    .await?;

    let top_patients_by_visits = sqlx::query_as::<_, PatientVisits>(
        r#"
        SELECT p.id, p.name, COUNT(r.id) AS visits
        FROM patients p
        LEFT JOIN registrations r ON r.patient_id = p.id
        WHERE (?1 IS NULL OR p.created_at >= ?1) AND (?2 IS NULL OR p.created_at <= ?2)
        GROUP BY p.id, p.name
        ORDER BY visits DESC, p.created_at DESC
        LIMIT 10
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(PatientsReport {
        patients_by_gender,
        patients_by_age_group,
        patients_over_time,
        top_patients_by_visits,
    })
}

pub async fn medicines(pool: &SqlitePool, range: &DateRange) -> DbResult<MedicinesReport> {
    let low_stock_threshold =
        settings::get_i64(pool, LOW_STOCK_SETTING, DEFAULT_LOW_STOCK_THRESHOLD).await?;

    let medicine_stock_levels =
        sqlx::query_as::<_, Medicine>("SELECT * FROM medicines ORDER BY stock ASC, name ASC")
            .fetch_all(pool)
            .await?;

    let low_stock_medicines = medicine_stock_levels
        .iter()
        .filter(|m| m.stock < low_stock_threshold)
        .cloned()
        .collect();

    let top_issued_medicines = sqlx::query_as::<_, MedicineUsage>(
        r#"
        SELECT m.id, m.name, m.dosage, COUNT(mi.id) AS issue_count, SUM(mi.quantity) AS total_quantity
        FROM medicines m
        JOIN medicine_issues mi ON mi.medicine_id = m.id
        WHERE (?1 IS NULL OR mi.issued_at >= ?1) AND (?2 IS NULL OR mi.issued_at <= ?2)
        GROUP BY m.id, m.name, m.dosage
        ORDER BY total_quantity DESC, m.name
        LIMIT 10
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let medicine_issues_over_time = sqlx::query_as::<_, DailyQuantity>(
        r#"
        SELECT substr(issued_at, 1, 10) AS date, COUNT(*) AS count, SUM(quantity) AS total_quantity
        FROM medicine_issues
        WHERE (?1 IS NULL OR issued_at >= ?1) AND (?2 IS NULL OR issued_at <= ?2)
        GROUP BY date
        ORDER BY date DESC
        LIMIT ?3
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .bind(DAYS_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(MedicinesReport {
        medicine_stock_levels,
        top_issued_medicines,
        medicine_issues_over_time,
        low_stock_medicines,
        low_stock_threshold,
    })
}

pub async fn tests(pool: &SqlitePool, range: &DateRange) -> DbResult<TestsReport> {
    let test_type_usage = sqlx::query_as::<_, TestTypeUsage>(
        r#"
        SELECT tt.id, tt.name,
            (SELECT COUNT(*) FROM test_results tr
              WHERE tr.test_type_id = tt.id
                AND (?1 IS NULL OR tr.entered_at >= ?1) AND (?2 IS NULL OR tr.entered_at <= ?2)
            ) AS result_count,
            (SELECT COUNT(*) FROM registration_tests rt
              WHERE rt.test_type_id = tt.id
                AND (?1 IS NULL OR rt.created_at >= ?1) AND (?2 IS NULL OR rt.created_at <= ?2)
            ) AS assigned_count
        FROM test_types tt
        ORDER BY result_count DESC, tt.name
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let test_results_over_time = sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT substr(entered_at, 1, 10) AS date, COUNT(*) AS count FROM test_results
        WHERE (?1 IS NULL OR entered_at >= ?1) AND (?2 IS NULL OR entered_at <= ?2)
        GROUP BY date
        ORDER BY date DESC
        LIMIT ?3
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .bind(DAYS_LIMIT)
    .fetch_all(pool)
    .await?;

    let abnormal_rows = sqlx::query_as::<_, TestResult>(
        r#"
        SELECT * FROM test_results
        WHERE status IN ('abnormal', 'critical')
          AND (?1 IS NULL OR entered_at >= ?1) AND (?2 IS NULL OR entered_at <= ?2)
        ORDER BY entered_at DESC, rowid DESC
        LIMIT 20
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let mut conn = pool.acquire().await?;
    let mut abnormal_results = Vec::with_capacity(abnormal_rows.len());
    for row in abnormal_rows {
        abnormal_results.push(test_results::detail(&mut conn, row).await?);
    }

    let (total_registrations_with_tests, registrations_with_results): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT rt.registration_id), COUNT(DISTINCT tr.registration_id)
        FROM registration_tests rt
        LEFT JOIN test_results tr
               ON tr.registration_id = rt.registration_id AND tr.test_type_id = rt.test_type_id
        WHERE (?1 IS NULL OR rt.created_at >= ?1) AND (?2 IS NULL OR rt.created_at <= ?2)
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(TestsReport {
        test_type_usage,
        test_results_over_time,
        abnormal_results,
        test_completion_rate: CompletionRate {
            total_registrations_with_tests,
            registrations_with_results,
            completion_rate: percentage(registrations_with_results, total_registrations_with_tests),
        },
    })
}

fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

pub async fn satisfaction(pool: &SqlitePool, range: &DateRange) -> DbResult<SatisfactionReport> {
    let (average_rating, total_ratings, min_rating, max_rating): (f64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT COALESCE(AVG(rating), 0.0), COUNT(*), COALESCE(MIN(rating), 0), COALESCE(MAX(rating), 0)
            FROM satisfaction_ratings
            WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(pool)
        .await?;

    let rating_distribution = sqlx::query_as::<_, RatingCount>(
        r#"
        SELECT rating, COUNT(*) AS count FROM satisfaction_ratings
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        GROUP BY rating
        ORDER BY rating ASC
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let satisfaction_over_time = sqlx::query_as::<_, DailyRating>(
        r#"
        SELECT substr(created_at, 1, 10) AS date, AVG(rating) AS avg_rating, COUNT(*) AS count
        FROM satisfaction_ratings
        WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        GROUP BY date
        ORDER BY date DESC
        LIMIT ?3
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .bind(DAYS_LIMIT)
    .fetch_all(pool)
    .await?;

    let recent_feedback = sqlx::query_as::<_, SatisfactionRating>(
        r#"
        SELECT * FROM satisfaction_ratings
        WHERE feedback IS NOT NULL
          AND (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at <= ?2)
        ORDER BY created_at DESC, rowid DESC
        LIMIT 10
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(SatisfactionReport {
        satisfaction_stats: SatisfactionStats {
            average_rating,
            total_ratings,
            min_rating,
            max_rating,
        },
        rating_distribution,
        satisfaction_over_time,
        recent_feedback,
    })
}
