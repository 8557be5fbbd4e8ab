use sqlx::PgPool;

/// Connect, migrate, and verify the revision status lookup table.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    courseforge_db::health_check(&pool).await.unwrap();

    let statuses: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM revision_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();

    assert_eq!(
        statuses,
        vec![
            (1, "open".to_string()),
            (2, "closed".to_string()),
            (3, "merged".to_string()),
            (4, "locked".to_string()),
        ]
    );
}

/// Every seeded status id decodes to the matching enum variant.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_enum_matches_seed_data(pool: PgPool) {
    use courseforge_db::models::status::RevisionStatus;

    let rows: Vec<(i16, String)> = sqlx::query_as("SELECT id, name FROM revision_statuses")
        .fetch_all(&pool)
        .await
        .unwrap();

    for (id, name) in rows {
        let status = RevisionStatus::from_id(id)
            .unwrap_or_else(|| panic!("status id {id} has no enum variant"));
        assert_eq!(status.label(), name);
    }
}
