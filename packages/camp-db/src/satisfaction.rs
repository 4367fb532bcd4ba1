//! Pesquisa de satisfação

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::models::{new_id, NewSatisfactionRating, SatisfactionRating};

pub async fn create(pool: &SqlitePool, input: &NewSatisfactionRating) -> DbResult<SatisfactionRating> {
    let feedback = input
        .feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let rating = sqlx::query_as::<_, SatisfactionRating>(
        "INSERT INTO satisfaction_ratings (id, rating, feedback, created_at) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(new_id())
    .bind(input.rating)
    .bind(feedback)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    info!("Avaliação registrada: nota {}", rating.rating);
    Ok(rating)
}

/// Todas as avaliações, mais recentes primeiro
pub async fn list(pool: &SqlitePool) -> DbResult<Vec<SatisfactionRating>> {
    let ratings = sqlx::query_as::<_, SatisfactionRating>(
        "SELECT * FROM satisfaction_ratings ORDER BY created_at DESC, rowid DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(ratings)
}
