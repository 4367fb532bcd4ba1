//! Códigos legíveis de paciente
//!
//! Formato: `R` + ano (2 dígitos) + mês (2 dígitos) + sequência com 3 dígitos,
//! ex.: `R2501001` para o primeiro paciente de janeiro de 2025. A sequência é
//! a contagem de pacientes já cadastrados com o mesmo prefixo de mês, calculada
//! no momento do cadastro, dentro da transação de escrita (`WriteTx`) que
//! insere o paciente; cadastros simultâneos são serializados pela trava.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::error::DbResult;

const PREFIX: char = 'R';

/// Prefixo do mês, ex.: `R2501`
pub fn month_prefix(date: NaiveDate) -> String {
    format!("{}{:02}{:02}", PREFIX, date.year() % 100, date.month())
}

/// Monta o código a partir da data e da sequência (começando em 1)
pub fn format_readable_id(date: NaiveDate, sequence: i64) -> String {
    format!("{}{:03}", month_prefix(date), sequence)
}

/// Calcula o próximo código de paciente para o mês de `now`
pub async fn next_patient_id(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<String> {
    let date = now.date_naive();
    let pattern = format!("{}%", month_prefix(date));

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE id LIKE ?")
        .bind(pattern)
        .fetch_one(&mut *conn)
        .await?;

    Ok(format_readable_id(date, existing + 1))
}
