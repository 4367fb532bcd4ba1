//! Dados iniciais: tipos de exame, medicamentos e configurações padrão.
//!
//! Só insere o que ainda não existe (por nome ou chave), então pode rodar a
//! cada inicialização sem sobrescrever alterações feitas pela equipe.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::models::new_id;
use crate::tx::WriteTx;

/// (nome, requer resultado, requer ficha impressa, requer código de barras)
const TEST_TYPES: &[(&str, bool, bool, bool)] = &[
    ("Random Blood Sugar (RBS)", true, true, true),
    ("Fasting Blood Sugar (FBS)", true, true, true),
    ("Blood Pressure", true, false, false),
    ("Total Cholesterol", true, true, true),
    ("Dental Checkup", true, false, false),
    ("General Health Checkup", true, false, false),
];

const MEDICINES: &[(&str, &str, i64)] = &[
    ("Paracetamol", "500mg", 100),
    ("Ibuprofen", "400mg", 50),
    ("Aspirin", "75mg", 75),
    ("Amoxicillin", "250mg", 30),
    ("Metformin", "500mg", 40),
    ("Atorvastatin", "20mg", 25),
    ("Lisinopril", "10mg", 35),
    ("Omeprazole", "20mg", 60),
];

/// (chave, valor, categoria)
const SETTINGS: &[(&str, &str, &str)] = &[
    ("camp_name", "Medical Camp", "general"),
    ("camp_location", "", "general"),
    ("contact_number", "", "general"),
    ("email", "", "general"),
    ("low_stock_threshold", "10", "medical"),
];

/// Quantidade de linhas inseridas por tabela
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub test_types: u64,
    pub medicines: u64,
    pub settings: u64,
}

pub async fn seed_defaults(pool: &SqlitePool) -> DbResult<SeedSummary> {
    let now = Utc::now();
    let mut summary = SeedSummary::default();
    let mut tx = WriteTx::begin(pool).await?;

    for (name, requires_result, requires_print_sheet, requires_barcode) in TEST_TYPES {
        summary.test_types += sqlx::query(
            r#"
            INSERT INTO test_types (id, name, requires_result, requires_print_sheet, requires_barcode, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(requires_result)
        .bind(requires_print_sheet)
        .bind(requires_barcode)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (name, dosage, stock) in MEDICINES {
        summary.medicines += sqlx::query(
            r#"
            INSERT INTO medicines (id, name, dosage, stock, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(dosage)
        .bind(stock)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for (key, value, category) in SETTINGS {
        summary.settings += sqlx::query(
            r#"
            INSERT INTO settings (key, value, category, updated_by, updated_at)
            VALUES (?, ?, ?, 'system', ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(category)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;

    info!(
        "Dados iniciais: {} tipos de exame, {} medicamentos, {} configurações inseridos",
        summary.test_types, summary.medicines, summary.settings
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicineInput;
    use crate::testing::TestDb;
    use crate::{medicines, settings, test_types};

    #[tokio::test]
    async fn seeds_once_and_keeps_edits() {
        let db = TestDb::new().await;

        let first = seed_defaults(&db.pool).await.unwrap();
        assert_eq!(
            first,
            SeedSummary {
                test_types: 6,
                medicines: 8,
                settings: 5
            }
        );

        let paracetamol = medicines::list(&db.pool)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.name == "Paracetamol")
            .unwrap();
        medicines::update(
            &db.pool,
            &paracetamol.id,
            &MedicineInput {
                name: "Paracetamol".to_string(),
                dosage: "500mg".to_string(),
                stock: 3,
            },
        )
        .await
        .unwrap();

        let second = seed_defaults(&db.pool).await.unwrap();
        assert_eq!(second, SeedSummary::default());
        assert_eq!(medicines::get(&db.pool, &paracetamol.id).await.unwrap().stock, 3);
        assert_eq!(test_types::list(&db.pool).await.unwrap().len(), 6);
        assert_eq!(settings::get(&db.pool, "low_stock_threshold").await.unwrap().category, "medical");
    }
}
