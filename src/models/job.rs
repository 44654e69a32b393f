use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::product::FilterOptions;
use crate::services::categories::DEFAULT_CATEGORY;

/// Status of a collection job.
///
/// `Succeeded` and `Failed` are terminal: no transition ever leaves them.
/// A process crash mid-`Running` leaves the row `Running` indefinitely; there
/// is no reconciler, which is a documented limitation of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Legal edges of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

/// The category selector a job was submitted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every top-level category and all of their subcategories.
    All,
    Category {
        category: String,
        subcategory: Option<String>,
    },
}

impl Scope {
    /// Canonical key used for same-scope in-flight coalescing and the
    /// `jobs.scope` column.
    pub fn key(&self) -> String {
        match self {
            Scope::All => "all".to_string(),
            Scope::Category {
                category,
                subcategory: None,
            } => category.clone(),
            Scope::Category {
                category,
                subcategory: Some(sub),
            } => format!("{category}/{sub}"),
        }
    }
}

/// A collection request as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectRequest {
    /// Collect every category/subcategory instead of a single selector.
    #[garde(skip)]
    #[serde(default)]
    pub all: bool,

    /// Top-level category name (e.g. "아우터"). Defaults when absent.
    #[garde(skip)]
    #[serde(default)]
    pub category: Option<String>,

    /// Subcategory name (e.g. "자켓"); used together with `category`.
    #[garde(skip)]
    #[serde(default)]
    pub subcategory: Option<String>,

    #[garde(dive)]
    #[serde(flatten)]
    pub filters: FilterOptions,

    /// When false, previously collected products are deliberately
    /// re-collected instead of being stripped by the dedup filter.
    #[garde(skip)]
    #[serde(default = "default_true")]
    pub dedupe_against_history: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CollectRequest {
    fn default() -> Self {
        Self {
            all: false,
            category: None,
            subcategory: None,
            filters: FilterOptions::default(),
            dedupe_against_history: true,
        }
    }
}

impl CollectRequest {
    /// Normalize the raw selector fields into a `Scope`.
    pub fn scope(&self) -> Scope {
        if self.all {
            return Scope::All;
        }
        let category = self
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        Scope::Category {
            category,
            subcategory: self.subcategory.clone(),
        }
    }
}

/// A collection job row from the store.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionJob {
    pub id: Uuid,
    pub scope: String,
    pub request: CollectRequest,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pointer to the result payload, set only on `Succeeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<Uuid>,
}
