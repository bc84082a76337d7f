//! Repository for `imgs` rows.

use sqlx::PgPool;

use crate::models::ImageRow;

/// Provides image-record insert and lookup operations.
pub struct ImageRepo;

impl ImageRepo {
    /// Bulk-insert image records: one transaction, one statement per row,
    /// rollback on the first failure.
    pub async fn insert_many(pool: &PgPool, imgs: &[ImageRow]) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for img in imgs {
            sqlx::query(
                "INSERT INTO imgs (id, ts, path, face_ids) VALUES ($1, $2, $3, $4)",
            )
            .bind(&img.id)
            .bind(img.ts)
            .bind(&img.path)
            .bind(&img.face_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// All images in which the given control object appears.
    pub async fn list_by_control_object(
        pool: &PgPool,
        cob_id: &str,
    ) -> Result<Vec<ImageRow>, sqlx::Error> {
        sqlx::query_as::<_, ImageRow>(
            "SELECT id, ts, path, face_ids FROM imgs WHERE $1 = ANY(face_ids) ORDER BY ts",
        )
        .bind(cob_id)
        .fetch_all(pool)
        .await
    }
}
