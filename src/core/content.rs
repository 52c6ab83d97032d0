use crate::core::fusion::CategoryAssignment;
use crate::core::hash::{ExactHash, PerceptualHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub type ContentId = String;

/// One stored item. `path` changes only through the executor, the hashes
/// only through (re)hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: ContentId,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub exact_hash: Option<ExactHash>,
    pub perceptual_hash: Option<PerceptualHash>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Content {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            id: format!("cnt_{}", Uuid::new_v4().simple()),
            path: path.into(),
            size_bytes,
            exact_hash: None,
            perceptual_hash: None,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ContentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_hashes(
        mut self,
        exact_hash: ExactHash,
        perceptual_hash: Option<PerceptualHash>,
    ) -> Self {
        self.exact_hash = Some(exact_hash);
        self.perceptual_hash = perceptual_hash;
        self
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

impl AsMut<Content> for Content {
    fn as_mut(&mut self) -> &mut Content {
        self
    }
}

/// Content paired with its fused categories, the planner's input unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedContent {
    pub content: Content,
    #[serde(default)]
    pub assignments: Vec<CategoryAssignment>,
}

impl CategorizedContent {
    pub fn new(content: Content, assignments: Vec<CategoryAssignment>) -> Self {
        Self {
            content,
            assignments,
        }
    }

    pub fn top_label(&self) -> Option<&str> {
        self.assignments.first().map(|a| a.label.as_str())
    }
}

impl AsMut<Content> for CategorizedContent {
    fn as_mut(&mut self) -> &mut Content {
        &mut self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_content_gets_unique_id() {
        let a = Content::new("/photos/a.jpg", 10);
        let b = Content::new("/photos/a.jpg", 10);
        assert!(a.id.starts_with("cnt_"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.file_name().unwrap(), "a.jpg");
    }

    #[test]
    fn test_top_label_of_uncategorized_is_none() {
        let item = CategorizedContent::new(Content::new("x.png", 1), vec![]);
        assert!(item.top_label().is_none());
    }
}
