use crate::core::content::{CategorizedContent, ContentId};
use crate::core::duplicate::DuplicateGroup;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Auto,
    Date,
    Category,
    Quality,
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Date => "date",
            Strategy::Category => "category",
            Strategy::Quality => "quality",
            Strategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Strategy::Auto),
            "date" => Ok(Strategy::Date),
            "category" => Ok(Strategy::Category),
            "quality" => Ok(Strategy::Quality),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!(
                "unknown strategy '{other}' (expected auto, date, category, quality or hybrid)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMove {
    pub content_id: ContentId,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
}

/// Pure description of the target layout. Built per run, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationPlan {
    /// Resolved strategy, never `Auto`.
    pub strategy: Strategy,
    pub root: PathBuf,
    pub folders: BTreeMap<String, Vec<ContentId>>,
    pub moves: Vec<PlannedMove>,
}

impl OrganizationPlan {
    pub fn folder_path(&self, key: &str) -> PathBuf {
        folder_path(&self.root, key)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub storage_root: PathBuf,
    /// How many leading assignments count as "primary" for quality folders.
    pub primary_count: usize,
    pub large_collection: usize,
    pub month_span: usize,
    pub category_diversity: usize,
    pub duplicates_folder: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            primary_count: 5,
            large_collection: 1000,
            month_span: 6,
            category_diversity: 10,
            duplicates_folder: "duplicates".to_string(),
        }
    }
}

const UNCATEGORIZED: &str = "uncategorized";
const UNKNOWN_DATE: &str = "unknown_date";
const HIGH_QUALITY_LABELS: [&str; 2] = ["high_quality", "professional"];
const LOW_QUALITY_LABELS: [&str; 2] = ["low_quality", "blurry"];

pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, items: &[CategorizedContent], strategy: Strategy) -> OrganizationPlan {
        self.build(items, &HashSet::new(), strategy)
    }

    /// Like [`Planner::plan`], but every non-representative member of a
    /// duplicate group goes to the duplicates folder.
    pub fn plan_deduplicated(
        &self,
        items: &[CategorizedContent],
        groups: &[DuplicateGroup],
        strategy: Strategy,
    ) -> OrganizationPlan {
        let redundant: HashSet<&str> = groups
            .iter()
            .flat_map(|g| g.redundant().iter().map(String::as_str))
            .collect();
        self.build(items, &redundant, strategy)
    }

    pub fn select_strategy(&self, items: &[CategorizedContent]) -> Strategy {
        let months: HashSet<String> = items
            .iter()
            .filter_map(|item| item.content.created_at)
            .map(|created| created.format("%Y-%m").to_string())
            .collect();
        let categories: HashSet<&str> = items.iter().filter_map(|item| item.top_label()).collect();

        let strategy = if items.len() > self.config.large_collection {
            Strategy::Hybrid
        } else if months.len() > self.config.month_span {
            Strategy::Date
        } else if categories.len() > self.config.category_diversity {
            Strategy::Category
        } else {
            Strategy::Hybrid
        };

        log::info!(
            "Selected {} strategy ({} items, {} months, {} categories)",
            strategy,
            items.len(),
            months.len(),
            categories.len()
        );
        strategy
    }

    fn build(
        &self,
        items: &[CategorizedContent],
        redundant: &HashSet<&str>,
        strategy: Strategy,
    ) -> OrganizationPlan {
        let strategy = match strategy {
            Strategy::Auto => self.select_strategy(items),
            other => other,
        };
        let root = self.config.storage_root.clone();
        let mut folders: BTreeMap<String, Vec<ContentId>> = BTreeMap::new();
        let mut moves = Vec::new();

        for item in items {
            let content = &item.content;
            let Some(file_name) = content.file_name() else {
                log::warn!(
                    "Skipping {}: path has no file name ({})",
                    content.id,
                    content.path.display()
                );
                continue;
            };

            let key = if redundant.contains(content.id.as_str()) {
                sanitize_segment(&self.config.duplicates_folder)
            } else {
                self.folder_key(item, strategy)
            };
            let dest_path = folder_path(&root, &key).join(file_name);

            folders.entry(key).or_default().push(content.id.clone());
            if dest_path != content.path {
                moves.push(PlannedMove {
                    content_id: content.id.clone(),
                    source_path: content.path.clone(),
                    dest_path,
                });
            }
        }

        log::debug!(
            "Planned {} move(s) into {} folder(s) using {} strategy",
            moves.len(),
            folders.len(),
            strategy
        );
        OrganizationPlan {
            strategy,
            root,
            folders,
            moves,
        }
    }

    fn folder_key(&self, item: &CategorizedContent, strategy: Strategy) -> String {
        match strategy {
            Strategy::Date => date_key(item),
            Strategy::Category => category_key(item),
            Strategy::Quality => self.quality_key(item).to_string(),
            Strategy::Hybrid | Strategy::Auto => {
                format!("{}/{}", date_key(item), category_key(item))
            }
        }
    }

    fn quality_key(&self, item: &CategorizedContent) -> &'static str {
        let primary: Vec<&str> = item
            .assignments
            .iter()
            .take(self.config.primary_count)
            .map(|a| a.label.as_str())
            .collect();

        if primary.iter().any(|l| HIGH_QUALITY_LABELS.contains(l)) {
            "high_quality"
        } else if primary.iter().any(|l| LOW_QUALITY_LABELS.contains(l)) {
            "low_quality"
        } else {
            "medium_quality"
        }
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

fn date_key(item: &CategorizedContent) -> String {
    match item.content.created_at {
        Some(created) => created.format("%Y/%m").to_string(),
        None => UNKNOWN_DATE.to_string(),
    }
}

fn category_key(item: &CategorizedContent) -> String {
    item.top_label()
        .map(sanitize_segment)
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}

/// Keep a label usable as a single directory name under the storage root.
fn sanitize_segment(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        cleaned
    }
}

fn folder_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}
