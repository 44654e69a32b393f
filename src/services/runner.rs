//! Job Runner
//!
//! Owns the collection job lifecycle. `submit` is non-blocking: it creates
//! the `pending` row, registers the scope in the in-flight table, and spawns
//! the actual collection work onto the runtime before returning, so the
//! caller always observes a `pending` job immediately.
//!
//! Same-scope submissions while a job is in flight are coalesced to the
//! in-flight job id; different scopes run concurrently without restriction.

use metrics::{counter, gauge, histogram};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

use crate::db::{queries, StoreError};
use crate::models::job::{CollectRequest, CollectionJob, JobStatus, Scope};
use crate::models::product::CollectedProduct;
use crate::services::dedup;
use crate::services::feed::{FeedError, ProductFeed};

/// Outcome of a submit call.
pub struct Submission {
    pub job: CollectionJob,
    /// True when the request was folded into an already-running job for the
    /// same scope.
    pub coalesced: bool,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("all {0} candidates failed collection")]
    AllFailed(usize),
}

pub struct JobRunner {
    db: SqlitePool,
    feed: Arc<dyn ProductFeed>,
    /// Scope key -> job id for every non-terminal job this process started.
    in_flight: Mutex<HashMap<String, Uuid>>,
}

impl JobRunner {
    pub fn new(db: SqlitePool, feed: Arc<dyn ProductFeed>) -> Self {
        Self {
            db,
            feed,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a collection request without blocking on any collection work.
    ///
    /// Returns once the job row exists (or an in-flight job for the same
    /// scope was found); all network and per-job store I/O happens on a
    /// spawned task afterwards.
    pub async fn submit(self: &Arc<Self>, request: CollectRequest) -> Result<Submission, StoreError> {
        let scope = request.scope();
        let key = scope.key();
        let job_id = Uuid::new_v4();

        // Reserve the scope before touching the store so two racing submits
        // for the same scope cannot both create rows.
        loop {
            let existing = {
                let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
                match in_flight.get(&key) {
                    Some(&id) => Some(id),
                    None => {
                        in_flight.insert(key.clone(), job_id);
                        None
                    }
                }
            };

            let Some(existing_id) = existing else {
                break;
            };

            let Some(job) = queries::get_job(&self.db, existing_id).await? else {
                // The owning submit reserved the scope but has not committed
                // its row yet; let it finish and look again.
                tokio::task::yield_now().await;
                continue;
            };
            if !job.status.is_terminal() {
                tracing::info!(job_id = %existing_id, scope = %key, "coalesced submit into in-flight job");
                return Ok(Submission {
                    job,
                    coalesced: true,
                });
            }

            // The job finished between writing its terminal status and
            // deregistering its scope; clear the stale entry and retry.
            self.release_scope(&key, existing_id);
        }

        let job = match queries::create_job(&self.db, job_id, &request).await {
            Ok(job) => job,
            Err(e) => {
                self.release_scope(&key, job_id);
                return Err(e);
            }
        };

        counter!("collection_jobs_submitted").increment(1);
        tracing::info!(job_id = %job_id, scope = %key, "collection job submitted");

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run(job_id, request, scope).await;
        });

        Ok(Submission {
            job,
            coalesced: false,
        })
    }

    fn release_scope(&self, key: &str, job_id: Uuid) {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if in_flight.get(key) == Some(&job_id) {
            in_flight.remove(key);
        }
    }

    /// Drive one job from `pending` to a terminal state. Never returns an
    /// error: the caller that submitted is long gone, so every failure ends
    /// up on the job row instead.
    async fn run(&self, job_id: Uuid, request: CollectRequest, scope: Scope) {
        let key = scope.key();
        let started = Instant::now();
        gauge!("collection_jobs_in_flight").increment(1.0);

        if let Err(e) = queries::update_status(&self.db, job_id, JobStatus::Running, None).await {
            tracing::error!(job_id = %job_id, error = %e, "failed to mark job running");
            gauge!("collection_jobs_in_flight").decrement(1.0);
            self.release_scope(&key, job_id);
            return;
        }

        match self.execute(&request, &scope).await {
            Ok(products) => match queries::assemble(&self.db, job_id, &products).await {
                Ok(result_id) => {
                    counter!("collection_jobs_completed").increment(1);
                    counter!("collection_products_collected").increment(products.len() as u64);
                    tracing::info!(
                        job_id = %job_id,
                        scope = %key,
                        result_id = %result_id,
                        products = products.len(),
                        "collection job succeeded"
                    );
                }
                Err(e) => {
                    counter!("collection_jobs_failed").increment(1);
                    tracing::error!(job_id = %job_id, error = %e, "failed to commit job result");
                    self.mark_failed(job_id, &format!("failed to record result: {e}"))
                        .await;
                }
            },
            Err(e) => {
                counter!("collection_jobs_failed").increment(1);
                tracing::warn!(job_id = %job_id, scope = %key, error = %e, "collection job failed");
                self.mark_failed(job_id, &e.to_string()).await;
            }
        }

        histogram!("collection_job_seconds").record(started.elapsed().as_secs_f64());
        gauge!("collection_jobs_in_flight").decrement(1.0);
        self.release_scope(&key, job_id);
    }

    async fn mark_failed(&self, job_id: Uuid, message: &str) {
        if let Err(e) =
            queries::update_status(&self.db, job_id, JobStatus::Failed, Some(message)).await
        {
            tracing::error!(job_id = %job_id, error = %e, "failed to record job failure");
        }
    }

    async fn execute(
        &self,
        request: &CollectRequest,
        scope: &Scope,
    ) -> Result<Vec<CollectedProduct>, RunError> {
        let candidates = self.feed.fetch_candidates(scope, &request.filters).await?;
        tracing::debug!(candidates = candidates.len(), "candidate fetch complete");

        let known_ids = queries::known_product_ids(&self.db).await?;
        let survivors =
            dedup::filter_candidates(candidates, &known_ids, !request.dedupe_against_history);

        let mut collected = Vec::with_capacity(survivors.len());
        let mut failed = 0usize;
        for candidate in &survivors {
            match self.feed.collect(candidate).await {
                Ok(product) => collected.push(product),
                Err(e) => {
                    // Per-item failure: drop the product, keep the job. It
                    // stays out of the ledger and eligible for a future run.
                    failed += 1;
                    tracing::warn!(sno = candidate.sno, error = %e, "product collection failed, skipping");
                }
            }
        }

        if collected.is_empty() && failed > 0 {
            return Err(RunError::AllFailed(failed));
        }

        Ok(collected)
    }
}
