use sqlx::PgPool;

/// Connect, migrate, and check the lookup tables are seeded.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bootstrap_seeds_lookup_tables(pool: PgPool) {
    riskcast_db::health_check(&pool).await.unwrap();

    for (table, expected) in [
        ("weather_result_statuses", ["pending", "processing", "completed", "failed"]),
        ("job_statuses", ["queued", "running", "completed", "failed"]),
    ] {
        let names: Vec<String> =
            sqlx::query_scalar(&format!("SELECT name FROM {table} ORDER BY id"))
                .fetch_all(&pool)
                .await
                .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(names, expected, "{table} seed data");
    }
}

/// Every table carries created_at/updated_at as timestamptz.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name::TEXT, column_name::TEXT \
         FROM information_schema.columns \
         WHERE table_schema = 'public' \
           AND column_name IN ('created_at', 'updated_at') \
           AND data_type <> 'timestamp with time zone'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert!(rows.is_empty(), "non-timestamptz timestamp columns: {rows:?}");

    let missing: Vec<String> = sqlx::query_scalar(
        "SELECT t.table_name::TEXT FROM information_schema.tables t \
         WHERE t.table_schema = 'public' AND t.table_type = 'BASE TABLE' \
           AND t.table_name <> '_sqlx_migrations' \
           AND (SELECT COUNT(*) FROM information_schema.columns c \
                WHERE c.table_schema = 'public' AND c.table_name = t.table_name \
                  AND c.column_name IN ('created_at', 'updated_at')) < 2",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert!(missing.is_empty(), "tables missing timestamps: {missing:?}");
}

/// A completed row without a payload violates the table constraints.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_check_constraints_reject_inconsistent_rows(pool: PgPool) {
    let err = sqlx::query(
        "INSERT INTO weather_results (latitude, longitude, query_date, day_of_year, status_id) \
         VALUES (10, 10, '2024-01-01', 1, 3)",
    )
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(err.to_string().contains("ck_weather_results_result_iff_completed"));

    let err = sqlx::query(
        "INSERT INTO weather_results (latitude, longitude, query_date, day_of_year) \
         VALUES (91, 10, '2024-01-01', 1)",
    )
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(err.to_string().contains("ck_weather_results_latitude"));
}
