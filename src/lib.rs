//! Content categorization and storage organization.
//!
//! Candidate labels from independent sources are fused into a ranked,
//! hierarchy-aware category list; hashed content is clustered into duplicate
//! groups; both feed a planner that decides the target folder layout, which
//! an executor then applies to the filesystem.

pub mod config;
pub mod core;
pub mod engine;

pub use config::{ConfigError, EngineConfig};
pub use crate::core::analysis::AnalysisResult;
pub use crate::core::content::{CategorizedContent, Content, ContentId};
pub use crate::core::duplicate::{
    DuplicateDetector, DuplicateGroup, DuplicateReport, DuplicateType, StorageSummary,
};
pub use crate::core::executor::{ExecutionError, ExecutionReport, PlanExecutor};
pub use crate::core::fusion::{
    AssignmentType, CategoryAssignment, CategoryCandidate, FusionEngine, FusionError,
    MethodWeights, SourceMethod,
};
pub use crate::core::hash::{ContentHasher, ExactHash, HashError, PerceptualHash};
pub use crate::core::planner::{OrganizationPlan, PlannedMove, Planner, Strategy};
pub use crate::core::tags::CustomTagSource;
pub use crate::core::taxonomy::Taxonomy;
pub use engine::{EngineError, OrganizationEngine};
