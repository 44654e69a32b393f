//! Job runner lifecycle tests using stub feed collaborators.

mod common;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use common::{candidate, collected, request_for, seed_ledger, test_pool, wait_terminal};
use trend_harvest::db::queries;
use trend_harvest::models::job::{CollectRequest, JobStatus, Scope};
use trend_harvest::models::product::{CandidateProduct, CollectedProduct, FilterOptions};
use trend_harvest::services::feed::{FeedError, ProductFeed};
use trend_harvest::services::runner::JobRunner;

/// Returns a fixed candidate set; per-product collection fails for the
/// configured snos.
struct StaticFeed {
    candidates: Vec<CandidateProduct>,
    fail_snos: HashSet<i64>,
}

impl StaticFeed {
    fn new(candidates: Vec<CandidateProduct>) -> Self {
        Self {
            candidates,
            fail_snos: HashSet::new(),
        }
    }

    fn failing_collection(candidates: Vec<CandidateProduct>, fail_snos: &[i64]) -> Self {
        Self {
            candidates,
            fail_snos: fail_snos.iter().copied().collect(),
        }
    }
}

#[async_trait]
impl ProductFeed for StaticFeed {
    async fn fetch_candidates(
        &self,
        _scope: &Scope,
        _filters: &FilterOptions,
    ) -> Result<Vec<CandidateProduct>, FeedError> {
        Ok(self.candidates.clone())
    }

    async fn collect(&self, c: &CandidateProduct) -> Result<CollectedProduct, FeedError> {
        if self.fail_snos.contains(&c.sno) {
            return Err(FeedError::Collection {
                sno: c.sno,
                reason: "basic metadata fetch failed".to_string(),
            });
        }
        Ok(collected(c.sno, &c.category))
    }
}

/// Never returns from the candidate fetch. Used to prove `submit` does not
/// wait for any collection work.
struct BlockingFeed;

#[async_trait]
impl ProductFeed for BlockingFeed {
    async fn fetch_candidates(
        &self,
        _scope: &Scope,
        _filters: &FilterOptions,
    ) -> Result<Vec<CandidateProduct>, FeedError> {
        futures::future::pending().await
    }

    async fn collect(&self, _c: &CandidateProduct) -> Result<CollectedProduct, FeedError> {
        futures::future::pending().await
    }
}

/// Fails the candidate fetch outright, like an unreachable upstream.
struct FailingFeed;

#[async_trait]
impl ProductFeed for FailingFeed {
    async fn fetch_candidates(
        &self,
        _scope: &Scope,
        _filters: &FilterOptions,
    ) -> Result<Vec<CandidateProduct>, FeedError> {
        Err(FeedError::Unavailable("category feed is down".to_string()))
    }

    async fn collect(&self, _c: &CandidateProduct) -> Result<CollectedProduct, FeedError> {
        Err(FeedError::Unavailable("category feed is down".to_string()))
    }
}

/// Holds the candidate fetch until the test releases a permit, keeping the
/// job `running` for as long as the test needs.
struct GatedFeed {
    gate: Arc<Semaphore>,
    candidates: Vec<CandidateProduct>,
}

#[async_trait]
impl ProductFeed for GatedFeed {
    async fn fetch_candidates(
        &self,
        _scope: &Scope,
        _filters: &FilterOptions,
    ) -> Result<Vec<CandidateProduct>, FeedError> {
        self.gate
            .acquire()
            .await
            .expect("gate closed")
            .forget();
        Ok(self.candidates.clone())
    }

    async fn collect(&self, c: &CandidateProduct) -> Result<CollectedProduct, FeedError> {
        Ok(collected(c.sno, &c.category))
    }
}

async fn fetch_result_snos(pool: &sqlx::SqlitePool, job_id: Uuid) -> Vec<i64> {
    let job = queries::get_job(pool, job_id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    let result_ref = job.result_ref.expect("succeeded job must carry a result pointer");
    let result = queries::get_result(pool, result_ref)
        .await
        .expect("Failed to get result")
        .expect("Result payload missing");
    result.products.iter().map(|p| p.sno).collect()
}

#[tokio::test]
async fn submit_returns_while_the_feed_blocks_forever() {
    let pool = test_pool().await;
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(BlockingFeed)));

    let submission = timeout(Duration::from_secs(1), runner.submit(request_for("아우터")))
        .await
        .expect("submit must not wait on collection work")
        .expect("submit failed");

    // The caller observes `pending` before any collaborator call happens.
    assert_eq!(submission.job.status, JobStatus::Pending);
    assert!(!submission.coalesced);
}

#[tokio::test]
async fn previously_collected_products_are_skipped() {
    let pool = test_pool().await;
    seed_ledger(&pool, &[101]).await;

    let feed = StaticFeed::new(vec![
        candidate(101, "아우터/자켓"),
        candidate(102, "아우터/자켓"),
        candidate(103, "아우터/자켓"),
    ]);
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(feed)));

    let submission = runner.submit(request_for("아우터")).await.expect("submit failed");
    let job = wait_terminal(&pool, submission.job.id).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(fetch_result_snos(&pool, job.id).await, vec![102, 103]);

    let known = queries::known_product_ids(&pool).await.expect("Failed to read ledger");
    assert_eq!(known, [101, 102, 103].into_iter().collect::<HashSet<i64>>());
}

#[tokio::test]
async fn dedup_override_recollects_known_products() {
    let pool = test_pool().await;
    seed_ledger(&pool, &[101]).await;

    let feed = StaticFeed::new(vec![
        candidate(101, "아우터/자켓"),
        candidate(102, "아우터/자켓"),
    ]);
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(feed)));

    let request = CollectRequest {
        dedupe_against_history: false,
        ..request_for("아우터")
    };
    let submission = runner.submit(request).await.expect("submit failed");
    let job = wait_terminal(&pool, submission.job.id).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(fetch_result_snos(&pool, job.id).await, vec![101, 102]);
    // Re-collection does not duplicate the ledger entry.
    assert_eq!(queries::ledger_count(&pool).await.expect("ledger count"), 2);
}

#[tokio::test]
async fn upstream_failure_fails_the_job_and_leaves_the_ledger_alone() {
    let pool = test_pool().await;
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(FailingFeed)));

    let submission = runner.submit(request_for("상의")).await.expect("submit failed");
    let job = wait_terminal(&pool, submission.job.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.expect("failed job must record an error");
    assert!(error.contains("category feed is down"));
    assert!(job.result_ref.is_none());
    assert_eq!(queries::ledger_count(&pool).await.expect("ledger count"), 0);
}

#[tokio::test]
async fn per_item_failures_drop_the_product_but_not_the_job() {
    let pool = test_pool().await;
    let feed = StaticFeed::failing_collection(
        vec![
            candidate(1, "팬츠/데님"),
            candidate(2, "팬츠/데님"),
            candidate(3, "팬츠/데님"),
        ],
        &[2],
    );
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(feed)));

    let submission = runner.submit(request_for("팬츠")).await.expect("submit failed");
    let job = wait_terminal(&pool, submission.job.id).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(fetch_result_snos(&pool, job.id).await, vec![1, 3]);

    // The failed product is not marked seen and stays eligible.
    let known = queries::known_product_ids(&pool).await.expect("Failed to read ledger");
    assert!(!known.contains(&2));
}

#[tokio::test]
async fn all_items_failing_fails_the_job() {
    let pool = test_pool().await;
    let feed = StaticFeed::failing_collection(
        vec![candidate(1, "팬츠/데님"), candidate(2, "팬츠/데님")],
        &[1, 2],
    );
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(feed)));

    let submission = runner.submit(request_for("팬츠")).await.expect("submit failed");
    let job = wait_terminal(&pool, submission.job.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.expect("error recorded").contains("failed collection"));
    assert_eq!(queries::ledger_count(&pool).await.expect("ledger count"), 0);
}

#[tokio::test]
async fn same_scope_submissions_coalesce_while_in_flight() {
    let pool = test_pool().await;
    let gate = Arc::new(Semaphore::new(0));
    let feed = GatedFeed {
        gate: Arc::clone(&gate),
        candidates: vec![candidate(7, "팬츠/데님")],
    };
    let runner = Arc::new(JobRunner::new(pool.clone(), Arc::new(feed)));

    let first = runner.submit(request_for("팬츠")).await.expect("submit failed");
    let second = runner.submit(request_for("팬츠")).await.expect("submit failed");

    // Coalesced: same job id, and only one row ever created for the scope.
    assert!(!first.coalesced);
    assert!(second.coalesced);
    assert_eq!(second.job.id, first.job.id);
    let jobs = queries::list_jobs(&pool, 10, 0).await.expect("Failed to list");
    assert_eq!(jobs.len(), 1);

    gate.add_permits(1);
    let job = wait_terminal(&pool, first.job.id).await;
    assert_eq!(job.status, JobStatus::Succeeded);

    // Once terminal, the scope is free again.
    gate.add_permits(1);
    let third = runner.submit(request_for("팬츠")).await.expect("submit failed");
    assert!(!third.coalesced);
    assert_ne!(third.job.id, first.job.id);
    wait_terminal(&pool, third.job.id).await;
}

#[tokio::test]
async fn different_scopes_run_concurrently() {
    let pool = test_pool().await;
    let gate = Arc::new(Semaphore::new(0));
    let feed = Arc::new(GatedFeed {
        gate: Arc::clone(&gate),
        candidates: vec![candidate(11, "스커트/미니 스커트")],
    });
    let runner = Arc::new(JobRunner::new(pool.clone(), feed));

    let pants = runner.submit(request_for("팬츠")).await.expect("submit failed");
    let skirts = runner.submit(request_for("스커트")).await.expect("submit failed");

    assert_ne!(pants.job.id, skirts.job.id);
    assert!(!pants.coalesced);
    assert!(!skirts.coalesced);

    gate.add_permits(2);

    let pants = wait_terminal(&pool, pants.job.id).await;
    let skirts = wait_terminal(&pool, skirts.job.id).await;
    assert_eq!(pants.status, JobStatus::Succeeded);
    assert_eq!(skirts.status, JobStatus::Succeeded);
}
