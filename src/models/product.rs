use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Popularity thresholds applied while walking the ranked category feed.
///
/// Carried explicitly in every collection request rather than read from
/// process-global state, so two concurrent jobs can use different thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FilterOptions {
    /// Minimum lifetime purchase count for a product to qualify.
    #[garde(range(min = 0))]
    #[serde(default = "default_min_purchase_count")]
    pub min_purchase_count: i64,

    /// Minimum review count.
    #[garde(range(min = 0))]
    #[serde(default = "default_min_review_count")]
    pub min_review_count: i64,

    /// Minimum positive-review percentage (0..=100).
    #[garde(range(min = 0.0, max = 100.0))]
    #[serde(default = "default_min_positive_rate")]
    pub min_positive_rate: f64,

    /// Per-target cap on qualifying products.
    #[garde(range(min = 1, max = 200))]
    #[serde(default = "default_max_products")]
    pub max_products: usize,
}

fn default_min_purchase_count() -> i64 {
    2000
}

fn default_min_review_count() -> i64 {
    100
}

fn default_min_positive_rate() -> f64 {
    95.0
}

fn default_max_products() -> usize {
    10
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            min_purchase_count: default_min_purchase_count(),
            min_review_count: default_min_review_count(),
            min_positive_rate: default_min_positive_rate(),
            max_products: default_max_products(),
        }
    }
}

/// A product surfaced by the ranked category feed that cleared the popularity
/// thresholds but has not yet been checked against the ledger or enriched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProduct {
    /// The feed's stable product identifier.
    pub sno: i64,
    pub name: Option<String>,
    pub price: Option<i64>,
    pub market_name: Option<String>,
    pub sell_count: i64,
    pub review_count: i64,
    pub positive_percent: i64,
    /// Category label the candidate was found under (e.g. "아우터/자켓").
    pub category: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInfo {
    pub consumer: Option<i64>,
    pub thumbnail_price: Option<i64>,
    pub discount_rate: Option<i64>,
}

/// A fully collected product summary: the candidate fields plus the detail
/// metadata and image references needed by downstream classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedProduct {
    pub sno: i64,
    pub name: Option<String>,
    pub category: String,
    pub market_name: Option<String>,
    pub url: String,
    pub price: Option<i64>,
    pub sell_count: i64,
    pub review_count: i64,
    pub positive_percent: i64,

    /// Seller-declared colors from the legal notice, free-form.
    pub colors: Option<String>,
    pub fabric: Option<String>,
    pub country: Option<String>,
    /// Color names offered as purchase options, in option order.
    pub option_colors: Vec<String>,
    pub price_info: Option<PriceInfo>,

    /// Image URLs only; the collector never downloads image bytes.
    pub cover_images: Vec<String>,
    pub detail_images: Vec<String>,
}

/// A row of the durable dedup ledger.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub product_id: i64,
    pub first_seen_at: DateTime<Utc>,
    pub source_job_id: Uuid,
}

/// A job's completed result payload.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub product_count: i64,
    pub products: Vec<CollectedProduct>,
}
