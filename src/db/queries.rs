use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::job::{CollectRequest, CollectionJob, JobStatus};
use crate::models::product::{CollectedProduct, JobResult, LedgerEntry};

const JOB_COLUMNS: &str = "id, scope, request, status, created_at, updated_at, error, result_ref";

fn decode_uuid(column: &str, raw: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn row_to_job(row: &SqliteRow) -> Result<CollectionJob, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let request: String = row.try_get("request")?;
    let result_ref: Option<String> = row.try_get("result_ref")?;

    Ok(CollectionJob {
        id: decode_uuid("id", &id)?,
        scope: row.try_get("scope")?,
        request: serde_json::from_str(&request).map_err(|e| sqlx::Error::ColumnDecode {
            index: "request".to_string(),
            source: Box::new(e),
        })?,
        status: status.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        error: row.try_get("error")?,
        result_ref: match result_ref {
            Some(r) => Some(decode_uuid("result_ref", &r)?),
            None => None,
        },
    })
}

/// Insert a new collection job in `pending` state.
pub async fn create_job(
    pool: &SqlitePool,
    job_id: Uuid,
    request: &CollectRequest,
) -> Result<CollectionJob, StoreError> {
    let now = Utc::now();
    let scope = request.scope().key();
    let request_json = serde_json::to_string(request)?;

    sqlx::query(
        r#"
        INSERT INTO jobs (id, scope, request, status, created_at, updated_at, error, result_ref)
        VALUES (?1, ?2, ?3, 'pending', ?4, ?5, NULL, NULL)
        "#,
    )
    .bind(job_id.to_string())
    .bind(&scope)
    .bind(&request_json)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(CollectionJob {
        id: job_id,
        scope,
        request: request.clone(),
        status: JobStatus::Pending,
        created_at: now,
        updated_at: now,
        error: None,
        result_ref: None,
    })
}

/// Get a job by id.
pub async fn get_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<CollectionJob>, StoreError> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some(r) => Some(row_to_job(&r)?),
        None => None,
    })
}

/// List jobs newest-first.
pub async fn list_jobs(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<CollectionJob>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| row_to_job(r).map_err(StoreError::from))
        .collect()
}

async fn current_status(pool: &SqlitePool, job_id: Uuid) -> Result<JobStatus, StoreError> {
    let row = sqlx::query("SELECT status FROM jobs WHERE id = ?1")
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)?;

    let status: String = row.try_get("status")?;
    status
        .parse()
        .map_err(|e| StoreError::Unavailable(sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        }))
}

/// Update a job's status, enforcing the state machine.
///
/// The transition guard is part of the UPDATE's WHERE clause, so a concurrent
/// reader either sees the old row or the complete new one, never a torn write.
/// `running -> succeeded` is reachable only through [`assemble`], which keeps
/// the result attachment and ledger append in the same transaction.
pub async fn update_status(
    pool: &SqlitePool,
    job_id: Uuid,
    new_status: JobStatus,
    error: Option<&str>,
) -> Result<(), StoreError> {
    let predecessor = match new_status {
        JobStatus::Running => JobStatus::Pending,
        JobStatus::Failed => JobStatus::Running,
        // These targets are never legal through this entry point.
        JobStatus::Pending | JobStatus::Succeeded => {
            let from = current_status(pool, job_id).await?;
            return Err(StoreError::InvalidTransition {
                from,
                to: new_status,
            });
        }
    };

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?1, updated_at = ?2, error = ?3
        WHERE id = ?4 AND status = ?5
        "#,
    )
    .bind(new_status.to_string())
    .bind(Utc::now())
    .bind(error)
    .bind(job_id.to_string())
    .bind(predecessor.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let from = current_status(pool, job_id).await?;
        return Err(StoreError::InvalidTransition {
            from,
            to: new_status,
        });
    }

    Ok(())
}

/// Commit a completed job: store the result payload, attach it to the job row,
/// transition `running -> succeeded`, and append the collected ids to the
/// ledger — all in one transaction. Either everything is observable or nothing
/// is; this is what makes cross-job dedup trustworthy.
pub async fn assemble(
    pool: &SqlitePool,
    job_id: Uuid,
    products: &[CollectedProduct],
) -> Result<Uuid, StoreError> {
    let result_id = Uuid::new_v4();
    let now = Utc::now();
    let payload = serde_json::to_string(products)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO job_results (id, job_id, product_count, products)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(result_id.to_string())
    .bind(job_id.to_string())
    .bind(products.len() as i64)
    .bind(&payload)
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'succeeded', updated_at = ?1, error = NULL, result_ref = ?2
        WHERE id = ?3 AND status = 'running'
        "#,
    )
    .bind(now)
    .bind(result_id.to_string())
    .bind(job_id.to_string())
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        let from = current_status(pool, job_id).await?;
        return Err(StoreError::InvalidTransition {
            from,
            to: JobStatus::Succeeded,
        });
    }

    for product in products {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO ledger (product_id, first_seen_at, source_job_id)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(product.sno)
        .bind(now)
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(result_id)
}

/// Fetch a result payload by its pointer.
pub async fn get_result(
    pool: &SqlitePool,
    result_id: Uuid,
) -> Result<Option<JobResult>, StoreError> {
    let row = sqlx::query(
        "SELECT id, job_id, product_count, products FROM job_results WHERE id = ?1",
    )
    .bind(result_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: String = row.try_get("id")?;
    let job_id: String = row.try_get("job_id")?;
    let products: String = row.try_get("products")?;

    Ok(Some(JobResult {
        id: decode_uuid("id", &id)?,
        job_id: decode_uuid("job_id", &job_id)?,
        product_count: row.try_get("product_count")?,
        products: serde_json::from_str(&products)?,
    }))
}

/// Snapshot of every product id ever fully collected.
pub async fn known_product_ids(pool: &SqlitePool) -> Result<HashSet<i64>, StoreError> {
    let rows = sqlx::query("SELECT product_id FROM ledger")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|r| r.try_get::<i64, _>("product_id").map_err(StoreError::from))
        .collect()
}

/// List ledger entries, most recently seen first.
pub async fn list_ledger(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT product_id, first_seen_at, source_job_id
        FROM ledger
        ORDER BY first_seen_at DESC, product_id DESC
        LIMIT ?1 OFFSET ?2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            let source_job_id: String = r.try_get("source_job_id")?;
            Ok(LedgerEntry {
                product_id: r.try_get("product_id")?,
                first_seen_at: r.try_get("first_seen_at")?,
                source_job_id: decode_uuid("source_job_id", &source_job_id)?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(StoreError::from)
}

/// Total number of ledger entries.
pub async fn ledger_count(pool: &SqlitePool) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COUNT(*) AS cnt FROM ledger")
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("cnt")?)
}
