//! Shared helpers for store and runner tests.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use trend_harvest::db;
use trend_harvest::models::job::{CollectRequest, CollectionJob, JobStatus};
use trend_harvest::models::product::{CandidateProduct, CollectedProduct};

/// Fresh in-memory database with the schema applied. A single connection
/// keeps the in-memory database alive for the whole test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    db::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn request_for(category: &str) -> CollectRequest {
    CollectRequest {
        category: Some(category.to_string()),
        ..CollectRequest::default()
    }
}

pub fn candidate(sno: i64, category: &str) -> CandidateProduct {
    CandidateProduct {
        sno,
        name: Some(format!("product {sno}")),
        price: Some(29900),
        market_name: Some("testmarket".to_string()),
        sell_count: 2500,
        review_count: 180,
        positive_percent: 97,
        category: category.to_string(),
        url: format!("https://m.a-bly.com/goods/{sno}"),
    }
}

pub fn collected(sno: i64, category: &str) -> CollectedProduct {
    let c = candidate(sno, category);
    CollectedProduct {
        sno: c.sno,
        name: c.name,
        category: c.category,
        market_name: c.market_name,
        url: c.url,
        price: c.price,
        sell_count: c.sell_count,
        review_count: c.review_count,
        positive_percent: c.positive_percent,
        colors: Some("블랙".to_string()),
        fabric: None,
        country: None,
        option_colors: vec!["블랙".to_string(), "아이보리".to_string()],
        price_info: None,
        cover_images: vec![format!("https://img.example.com/{sno}/cover.jpg")],
        detail_images: vec![format!("https://img.example.com/{sno}/detail_1.jpg")],
    }
}

/// Poll a job until it reaches a terminal state.
pub async fn wait_terminal(pool: &SqlitePool, job_id: Uuid) -> CollectionJob {
    for _ in 0..500 {
        let job = trend_harvest::db::queries::get_job(pool, job_id)
            .await
            .expect("Failed to get job")
            .expect("Job not found");
        if job.status.is_terminal() {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

/// Assert helper: seed the ledger by running a full job lifecycle.
pub async fn seed_ledger(pool: &SqlitePool, snos: &[i64]) {
    use trend_harvest::db::queries;

    let job = queries::create_job(pool, Uuid::new_v4(), &request_for("아우터"))
        .await
        .expect("Failed to create seed job");
    queries::update_status(pool, job.id, JobStatus::Running, None)
        .await
        .expect("Failed to mark seed job running");
    let products: Vec<CollectedProduct> =
        snos.iter().map(|&sno| collected(sno, "아우터/자켓")).collect();
    queries::assemble(pool, job.id, &products)
        .await
        .expect("Failed to assemble seed job");
}
