use std::time::Duration;

use chrono::NaiveDate;
use riskcast_core::result_state::ResultState;
use riskcast_core::submission::NewWeatherResult;
use riskcast_db::models::job::WeatherProbabilityParams;
use riskcast_db::models::status::{JobStatus, WeatherResultStatus};
use riskcast_db::models::weather_result::{ResultListQuery, WeatherResult};
use riskcast_db::repositories::{JobRepo, WeatherResultRepo};
use serde_json::json;
use sqlx::PgPool;

fn new_result(day: u32) -> NewWeatherResult {
    NewWeatherResult::new(40.7128, -74.006, NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_and_enqueue(pool: PgPool) {
    let (record, job) = WeatherResultRepo::create_and_enqueue(&pool, &new_result(15))
        .await
        .unwrap();

    assert_eq!(record.status_id, WeatherResultStatus::Pending.id());
    assert_eq!(record.day_of_year, 15);
    assert!(record.result.is_none());
    assert_eq!(job.status_id, JobStatus::Queued.id());
    assert_eq!(
        job.weather_probability_params().unwrap(),
        WeatherProbabilityParams { result_id: record.id }
    );

    let jobs = JobRepo::list_for_result(&pool, record.id).await.unwrap();
    assert_eq!(jobs.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lifecycle_transitions_are_conditional(pool: PgPool) {
    let record = WeatherResultRepo::create(&pool, &new_result(2)).await.unwrap();
    let payload = json!({"probabilities": {"hot_prob": 42.5}});

    // Cannot complete or fail before processing.
    assert!(!WeatherResultRepo::complete(&pool, record.id, &payload).await.unwrap());
    assert!(!WeatherResultRepo::fail(&pool, record.id, "boom").await.unwrap());

    assert!(WeatherResultRepo::mark_processing(&pool, record.id).await.unwrap());
    // A second claim loses.
    assert!(!WeatherResultRepo::mark_processing(&pool, record.id).await.unwrap());

    assert!(WeatherResultRepo::complete(&pool, record.id, &payload).await.unwrap());
    // Terminal: no further transitions.
    assert!(!WeatherResultRepo::fail(&pool, record.id, "late").await.unwrap());

    let row = WeatherResultRepo::find_by_id(&pool, record.id)
        .await
        .unwrap()
        .unwrap();
    let stored = WeatherResult::try_from(row).unwrap();
    assert_eq!(
        stored.state.payload().unwrap().probabilities["hot_prob"],
        json!(42.5)
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fail_stores_message(pool: PgPool) {
    let record = WeatherResultRepo::create(&pool, &new_result(3)).await.unwrap();
    assert!(WeatherResultRepo::mark_processing(&pool, record.id).await.unwrap());
    assert!(WeatherResultRepo::fail(&pool, record.id, "model unavailable").await.unwrap());

    let row = WeatherResultRepo::find_by_id(&pool, record.id)
        .await
        .unwrap()
        .unwrap();
    let stored = WeatherResult::try_from(row).unwrap();
    assert_eq!(stored.state, ResultState::Failed("model unavailable".into()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_newest_first_with_paging(pool: PgPool) {
    let mut ids = Vec::new();
    for day in 1..=3 {
        ids.push(WeatherResultRepo::create(&pool, &new_result(day)).await.unwrap().id);
    }

    let all = WeatherResultRepo::list(&pool, &ResultListQuery::default())
        .await
        .unwrap();
    let listed: Vec<i64> = all.iter().map(|r| r.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);

    let page = WeatherResultRepo::list(
        &pool,
        &ResultListQuery {
            limit: Some(1),
            offset: Some(1),
        },
    )
    .await
    .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[1]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_claim_next_is_fifo_and_exclusive(pool: PgPool) {
    let (first, _) = WeatherResultRepo::create_and_enqueue(&pool, &new_result(1))
        .await
        .unwrap();
    let (second, _) = WeatherResultRepo::create_and_enqueue(&pool, &new_result(2))
        .await
        .unwrap();

    assert_eq!(JobRepo::count_queued(&pool).await.unwrap(), 2);
    let a = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let b = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());
    assert_eq!(JobRepo::count_queued(&pool).await.unwrap(), 0);

    assert_eq!(a.weather_probability_params().unwrap().result_id, first.id);
    assert_eq!(b.weather_probability_params().unwrap().result_id, second.id);
    assert_eq!(a.status_id, JobStatus::Running.id());
    assert!(a.claimed_at.is_some());

    assert!(JobRepo::complete(&pool, a.id).await.unwrap());
    assert!(JobRepo::fail(&pool, b.id, "script timed out").await.unwrap());

    let a = JobRepo::find_by_id(&pool, a.id).await.unwrap().unwrap();
    let b = JobRepo::find_by_id(&pool, b.id).await.unwrap().unwrap();
    assert_eq!(a.status_id, JobStatus::Completed.id());
    assert!(a.completed_at.is_some());
    assert_eq!(b.status_id, JobStatus::Failed.id());
    assert_eq!(b.error_message.as_deref(), Some("script timed out"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stored_payload_keeps_key_order(pool: PgPool) {
    let record = WeatherResultRepo::create(&pool, &new_result(3)).await.unwrap();
    assert!(WeatherResultRepo::mark_processing(&pool, record.id).await.unwrap());
    let payload = json!({
        "probabilities": {"very cold": 5.0, "hot": 10.0, "very uncomfortable": 1.0},
        "meta": {"data_source": "synthetic"}
    });
    assert!(WeatherResultRepo::complete(&pool, record.id, &payload).await.unwrap());

    let row = WeatherResultRepo::find_by_id(&pool, record.id)
        .await
        .unwrap()
        .unwrap();
    let stored = row.result.expect("payload stored");
    let top: Vec<&str> = stored.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(top, ["probabilities", "meta"]);
    let metrics: Vec<&str> = stored["probabilities"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(metrics, ["very cold", "hot", "very uncomfortable"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_job_transitions_require_running(pool: PgPool) {
    let (_, job) = WeatherResultRepo::create_and_enqueue(&pool, &new_result(4))
        .await
        .unwrap();
    // Still queued.
    assert!(!JobRepo::complete(&pool, job.id).await.unwrap());

    let claimed = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert!(JobRepo::fail(&pool, claimed.id, "script timed out").await.unwrap());
    // A late completion does not overwrite the failure.
    assert!(!JobRepo::complete(&pool, claimed.id).await.unwrap());

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fail_stale_takes_over_old_claims_only(pool: PgPool) {
    WeatherResultRepo::create_and_enqueue(&pool, &new_result(5)).await.unwrap();
    WeatherResultRepo::create_and_enqueue(&pool, &new_result(6)).await.unwrap();
    let old = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    let fresh = JobRepo::claim_next(&pool).await.unwrap().unwrap();

    sqlx::query("UPDATE jobs SET claimed_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(old.id)
        .execute(&pool)
        .await
        .unwrap();

    let taken = JobRepo::fail_stale(&pool, Duration::from_secs(3600), "abandoned")
        .await
        .unwrap();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].id, old.id);
    assert_eq!(taken[0].status_id, JobStatus::Failed.id());
    assert_eq!(taken[0].error_message.as_deref(), Some("abandoned"));

    let fresh = JobRepo::find_by_id(&pool, fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.status_id, JobStatus::Running.id());
}
