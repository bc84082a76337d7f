//! Integration tests for the store repositories.
//!
//! Each test runs against a fresh database with the crate migrations
//! applied (pgvector extension included).

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use facelink_core::types::{ControlObject, FaceBox, FacialFeaturesVector, Sex, FEATURE_DIM};
use facelink_db::models::{FacialFeaturesRow, ImageRow};
use facelink_db::repositories::{ControlObjectRepo, FacialFeaturesRepo, ImageRepo};

fn person(passport: &str, surname: &str) -> ControlObject {
    ControlObject {
        id: Uuid::new_v4().to_string(),
        ts: Utc::now(),
        passport: passport.to_string(),
        surname: surname.to_string(),
        name: "Anna".to_string(),
        patronymic: "-".to_string(),
        sex: Sex::Female,
        birthdate: "1990-04-12".to_string(),
        phone_num: "-".to_string(),
        email: "-".to_string(),
        address: "-".to_string(),
    }
}

/// Unit vector along the given axis; a convenient orthogonal family for
/// similarity tests.
fn axis_vector(axis: usize) -> FacialFeaturesVector {
    let mut v = vec![0.0; FEATURE_DIM];
    v[axis] = 1.0;
    FacialFeaturesVector(v)
}

fn feature_row(cob_id: &str, img_id: &str, ffv: FacialFeaturesVector) -> FacialFeaturesRow {
    FacialFeaturesRow {
        id: Uuid::new_v4().to_string(),
        cob_id: cob_id.to_string(),
        img_id: img_id.to_string(),
        face_box: FaceBox([10, 110, 120, 20]),
        features: ffv,
    }
}

// ---------------------------------------------------------------------------
// Round-trip law: insert then select by passport
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn insert_then_find_by_passport_round_trips(pool: PgPool) {
    let cob = person("4510 123456", "Karenina");
    ControlObjectRepo::insert_many(&pool, std::slice::from_ref(&cob))
        .await
        .unwrap();

    let found = ControlObjectRepo::find_by_passport(&pool, &cob.passport)
        .await
        .unwrap();

    assert_eq!(found.id, cob.id);
    assert_eq!(found.surname, cob.surname);
    assert_eq!(found.sex, Sex::Female);
    assert!(cob.same_identity(&found));
}

#[sqlx::test]
async fn find_by_passport_returns_sentinel_when_absent(pool: PgPool) {
    let found = ControlObjectRepo::find_by_passport(&pool, "0000 000000")
        .await
        .unwrap();
    assert!(found.is_unknown());
}

#[sqlx::test]
async fn find_by_passport_resolves_latest_row(pool: PgPool) {
    let mut old = person("4510 123456", "Karenina");
    old.ts = Utc::now() - chrono::Duration::days(30);
    let new = person("4510 123456", "Vronskaya");
    ControlObjectRepo::insert_many(&pool, &[old, new.clone()])
        .await
        .unwrap();

    let found = ControlObjectRepo::find_by_passport(&pool, "4510 123456")
        .await
        .unwrap();
    assert_eq!(found.surname, new.surname);
}

// ---------------------------------------------------------------------------
// Round-trip law: images by control object
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn images_found_iff_cob_in_face_ids(pool: PgPool) {
    let p1 = Uuid::new_v4().to_string();
    let p2 = Uuid::new_v4().to_string();

    let img = ImageRow {
        id: Uuid::new_v4().to_string(),
        ts: Utc::now(),
        path: "/var/lib/facelink/imgs/a.jpg".to_string(),
        face_ids: vec![p1.clone()],
    };
    ImageRepo::insert_many(&pool, std::slice::from_ref(&img))
        .await
        .unwrap();

    let hits = ImageRepo::list_by_control_object(&pool, &p1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, img.id);
    assert_eq!(hits[0].face_ids, vec![p1]);

    let misses = ImageRepo::list_by_control_object(&pool, &p2).await.unwrap();
    assert!(misses.is_empty());
}

// ---------------------------------------------------------------------------
// Nearest-neighbour lookup
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn feature_vector_lookup_finds_match_within_boundary(pool: PgPool) {
    let cob = person("4510 123456", "Karenina");
    ControlObjectRepo::insert_many(&pool, std::slice::from_ref(&cob))
        .await
        .unwrap();

    let img_id = Uuid::new_v4().to_string();
    FacialFeaturesRepo::insert_many(&pool, &[feature_row(&cob.id, &img_id, axis_vector(0))])
        .await
        .unwrap();

    // Identical vector: sin²θ = 0, inside any positive boundary.
    let found = ControlObjectRepo::find_by_feature_vector(&pool, &axis_vector(0), 0.3)
        .await
        .unwrap();
    assert_eq!(found.id, cob.id);
}

#[sqlx::test]
async fn feature_vector_lookup_returns_sentinel_outside_boundary(pool: PgPool) {
    let cob = person("4510 123456", "Karenina");
    ControlObjectRepo::insert_many(&pool, std::slice::from_ref(&cob))
        .await
        .unwrap();

    let img_id = Uuid::new_v4().to_string();
    FacialFeaturesRepo::insert_many(&pool, &[feature_row(&cob.id, &img_id, axis_vector(0))])
        .await
        .unwrap();

    // Orthogonal vector: sin²θ = 1, outside the boundary.
    let found = ControlObjectRepo::find_by_feature_vector(&pool, &axis_vector(1), 0.3)
        .await
        .unwrap();
    assert!(found.is_unknown());
}

#[sqlx::test]
async fn feature_vector_lookup_picks_closest_person(pool: PgPool) {
    let near = person("4510 111111", "Near");
    let far = person("4510 222222", "Far");
    ControlObjectRepo::insert_many(&pool, &[near.clone(), far.clone()])
        .await
        .unwrap();

    // `near` gets the query axis itself; `far` gets a vector at a small
    // angle to it, still within the boundary but further away.
    let mut tilted = vec![0.0; FEATURE_DIM];
    tilted[0] = 0.9;
    tilted[1] = 0.3;

    let img = Uuid::new_v4().to_string();
    FacialFeaturesRepo::insert_many(
        &pool,
        &[
            feature_row(&near.id, &img, axis_vector(0)),
            feature_row(&far.id, &img, FacialFeaturesVector(tilted)),
        ],
    )
    .await
    .unwrap();

    let found = ControlObjectRepo::find_by_feature_vector(&pool, &axis_vector(0), 0.5)
        .await
        .unwrap();
    assert_eq!(found.id, near.id);
}

#[sqlx::test]
async fn feature_vector_lookup_averages_multiple_rows(pool: PgPool) {
    let cob = person("4510 123456", "Karenina");
    ControlObjectRepo::insert_many(&pool, std::slice::from_ref(&cob))
        .await
        .unwrap();

    // Two enrollment rows tilted either side of the axis; their mean points
    // straight down the axis.
    let mut a = vec![0.0; FEATURE_DIM];
    a[0] = 0.8;
    a[1] = 0.2;
    let mut b = vec![0.0; FEATURE_DIM];
    b[0] = 0.8;
    b[1] = -0.2;

    let img = Uuid::new_v4().to_string();
    FacialFeaturesRepo::insert_many(
        &pool,
        &[
            feature_row(&cob.id, &img, FacialFeaturesVector(a)),
            feature_row(&cob.id, &img, FacialFeaturesVector(b)),
        ],
    )
    .await
    .unwrap();

    let found = ControlObjectRepo::find_by_feature_vector(&pool, &axis_vector(0), 0.05)
        .await
        .unwrap();
    assert_eq!(found.id, cob.id);
}
