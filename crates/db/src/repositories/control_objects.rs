//! Repository for `control_objects` rows and identity lookup.

use sqlx::PgPool;

use facelink_core::types::{ControlObject, FacialFeaturesVector};

use crate::models::ControlObjectRow;

const CONTROL_OBJECT_COLUMNS: &str =
    "id, ts, passport, surname, name, patronymic, sex, birthdate, phone_num, email, address";

/// Provides control-object insert and lookup operations.
pub struct ControlObjectRepo;

impl ControlObjectRepo {
    /// Bulk-insert control objects: one transaction, one statement per row,
    /// rollback on the first failure.
    pub async fn insert_many(pool: &PgPool, cobs: &[ControlObject]) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for cob in cobs {
            sqlx::query(
                "INSERT INTO control_objects \
                     (id, ts, passport, surname, name, patronymic, sex, birthdate, \
                      phone_num, email, address) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(&cob.id)
            .bind(cob.ts)
            .bind(&cob.passport)
            .bind(&cob.surname)
            .bind(&cob.name)
            .bind(&cob.patronymic)
            .bind(cob.sex.as_str())
            .bind(&cob.birthdate)
            .bind(&cob.phone_num)
            .bind(&cob.email)
            .bind(&cob.address)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Look up a person by passport.
    ///
    /// The table is append-only, so the newest row for the passport wins.
    /// Returns the sentinel "no match" object when no row matches, so
    /// callers can check `is_unknown()`.
    pub async fn find_by_passport(
        pool: &PgPool,
        passport: &str,
    ) -> Result<ControlObject, sqlx::Error> {
        let query = format!(
            "SELECT {CONTROL_OBJECT_COLUMNS} FROM control_objects \
             WHERE passport = $1 ORDER BY ts DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, ControlObjectRow>(&query)
            .bind(passport)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(ControlObject::from).unwrap_or_else(ControlObject::unknown))
    }

    /// Cosine-similarity nearest-neighbour lookup.
    ///
    /// Joins each person's mean feature vector against the query vector and
    /// keeps candidates whose `1 − cos²θ` (i.e. sin²θ) is below
    /// `sin2_boundary`, closest first. Returns the sentinel object when no
    /// stored vector is within the boundary.
    pub async fn find_by_feature_vector(
        pool: &PgPool,
        ffv: &FacialFeaturesVector,
        sin2_boundary: f64,
    ) -> Result<ControlObject, sqlx::Error> {
        let query = format!(
            "SELECT {CONTROL_OBJECT_COLUMNS} FROM ( \
                 SELECT DISTINCT ON (id) {CONTROL_OBJECT_COLUMNS} \
                 FROM control_objects ORDER BY id, ts DESC \
             ) c \
             JOIN ( \
                 SELECT cob_id, AVG(ff) AS eff \
                 FROM facial_features GROUP BY cob_id \
             ) f ON f.cob_id = c.id \
             WHERE 1 - power(1 - (f.eff <=> $1::vector), 2) < $2 \
             ORDER BY 1 - power(1 - (f.eff <=> $1::vector), 2) \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, ControlObjectRow>(&query)
            .bind(ffv.to_sql_literal())
            .bind(sin2_boundary)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(ControlObject::from).unwrap_or_else(ControlObject::unknown))
    }
}
