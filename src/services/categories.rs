//! Static Ably category taxonomy.
//!
//! The names here are depth-1 screen categories; collection walks their
//! depth-2 subcategories. The `sno` values are the analytics
//! `CATEGORY_SNO` ids that go into the pagination token, not the
//! screen-display ids the subcategory list itself carries.

use serde::Serialize;

use crate::models::job::Scope;

/// Category used when a request names no selector at all.
pub const DEFAULT_CATEGORY: &str = "아우터";

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub name: &'static str,
    /// Name the upstream API uses when it differs from ours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_name: Option<&'static str>,
    pub sno: i64,
    pub subcategories: &'static [Subcategory],
}

#[derive(Debug, Clone, Serialize)]
pub struct Subcategory {
    pub name: &'static str,
    pub sno: i64,
}

const fn sub(name: &'static str, sno: i64) -> Subcategory {
    Subcategory { name, sno }
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "아우터",
        api_name: None,
        sno: 7,
        subcategories: &[
            sub("가디건", 16),
            sub("자켓", 293),
            sub("집업/점퍼", 294),
            sub("바람막이", 497),
            sub("코트", 296),
            sub("플리스", 577),
            sub("야상", 496),
            sub("패딩", 297),
        ],
    },
    Category {
        name: "상의",
        api_name: None,
        sno: 8,
        subcategories: &[
            sub("후드", 500),
            sub("맨투맨", 300),
            sub("니트", 299),
            sub("셔츠", 499),
            sub("긴소매티셔츠", 498),
            sub("블라우스", 298),
            sub("조끼", 357),
            sub("반소매티셔츠", 18),
            sub("민소매", 21),
        ],
    },
    Category {
        name: "팬츠",
        api_name: None,
        sno: 174,
        subcategories: &[
            sub("롱팬츠", 176),
            sub("슬랙스", 178),
            sub("데님", 501),
            sub("숏팬츠", 177),
        ],
    },
    Category {
        name: "스커트",
        api_name: None,
        sno: 203,
        subcategories: &[sub("미디/롱스커트", 205), sub("미니 스커트", 204)],
    },
    Category {
        name: "원피스",
        api_name: Some("원피스/세트"),
        sno: 10,
        subcategories: &[
            sub("롱원피스", 207),
            sub("투피스", 208),
            sub("점프수트", 533),
            sub("미니원피스", 206),
        ],
    },
];

/// A single feed walk: one subcategory (or bare category) to paginate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub label: String,
    pub category_sno: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum UnknownScope {
    #[error("unknown category: {0}")]
    Category(String),

    #[error("unknown subcategory for {category}: {subcategory}")]
    Subcategory {
        category: String,
        subcategory: String,
    },
}

fn find_category(name: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.name == name)
}

fn category_targets(category: &'static Category) -> Vec<Target> {
    if category.subcategories.is_empty() {
        return vec![Target {
            label: category.name.to_string(),
            category_sno: category.sno,
        }];
    }
    category
        .subcategories
        .iter()
        .map(|s| Target {
            label: format!("{}/{}", category.name, s.name),
            category_sno: s.sno,
        })
        .collect()
}

/// Expand a scope into the concrete list of feed walks it covers.
pub fn resolve_targets(scope: &Scope) -> Result<Vec<Target>, UnknownScope> {
    match scope {
        Scope::All => Ok(CATEGORIES.iter().flat_map(category_targets).collect()),
        Scope::Category {
            category,
            subcategory,
        } => {
            let cat = find_category(category)
                .ok_or_else(|| UnknownScope::Category(category.clone()))?;
            match subcategory {
                None => Ok(category_targets(cat)),
                Some(sub_name) => {
                    let sub = cat
                        .subcategories
                        .iter()
                        .find(|s| s.name == sub_name)
                        .ok_or_else(|| UnknownScope::Subcategory {
                            category: category.clone(),
                            subcategory: sub_name.clone(),
                        })?;
                    Ok(vec![Target {
                        label: format!("{}/{}", cat.name, sub.name),
                        category_sno: sub.sno,
                    }])
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_every_subcategory() {
        let targets = resolve_targets(&Scope::All).unwrap();
        let expected: usize = CATEGORIES.iter().map(|c| c.subcategories.len()).sum();
        assert_eq!(targets.len(), expected);
        assert!(targets.iter().any(|t| t.label == "아우터/자켓" && t.category_sno == 293));
    }

    #[test]
    fn category_expands_its_subcategories() {
        let scope = Scope::Category {
            category: "스커트".to_string(),
            subcategory: None,
        };
        let targets = resolve_targets(&scope).unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn single_subcategory_resolves_to_one_target() {
        let scope = Scope::Category {
            category: "팬츠".to_string(),
            subcategory: Some("데님".to_string()),
        };
        let targets = resolve_targets(&scope).unwrap();
        assert_eq!(
            targets,
            vec![Target {
                label: "팬츠/데님".to_string(),
                category_sno: 501,
            }]
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        let scope = Scope::Category {
            category: "invalid".to_string(),
            subcategory: None,
        };
        assert!(matches!(
            resolve_targets(&scope),
            Err(UnknownScope::Category(_))
        ));

        let scope = Scope::Category {
            category: "팬츠".to_string(),
            subcategory: Some("코트".to_string()),
        };
        assert!(matches!(
            resolve_targets(&scope),
            Err(UnknownScope::Subcategory { .. })
        ));
    }
}
