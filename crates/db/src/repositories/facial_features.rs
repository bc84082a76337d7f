//! Repository for `facial_features` rows.

use sqlx::PgPool;

use crate::models::FacialFeaturesRow;

/// Provides facial-features insert operations. Rows are write-only: the
/// nearest-neighbour query aggregates them server-side and nothing ever
/// reads a vector back out.
pub struct FacialFeaturesRepo;

impl FacialFeaturesRepo {
    /// Bulk-insert feature rows: one transaction, one statement per row,
    /// rollback on the first failure. `fb` lands as `BIGINT[]`, `ff` as a
    /// pgvector literal.
    pub async fn insert_many(pool: &PgPool, rows: &[FacialFeaturesRow]) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO facial_features (id, cob_id, img_id, fb, ff) \
                 VALUES ($1, $2, $3, $4, $5::vector)",
            )
            .bind(&row.id)
            .bind(&row.cob_id)
            .bind(&row.img_id)
            .bind(row.face_box.to_db())
            .bind(row.features.to_sql_literal())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
