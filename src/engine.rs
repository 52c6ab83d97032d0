use crate::config::{ConfigError, EngineConfig};
use crate::core::analysis::AnalysisResult;
use crate::core::content::{CategorizedContent, Content};
use crate::core::duplicate::{DuplicateDetector, DuplicateGroup, DuplicateReport, StorageSummary};
use crate::core::executor::{ExecutionReport, PlanExecutor};
use crate::core::fusion::{CategoryAssignment, CategoryCandidate, FusionEngine, FusionError};
use crate::core::hash::ContentHasher;
use crate::core::history::{History, HistoryRecord};
use crate::core::planner::{OrganizationPlan, Planner, Strategy};
use crate::core::rules::RuleBasedSource;
use crate::core::scanner::{ContentScanner, ScanOutcome};
use crate::core::tags::CustomTagSource;
use crate::core::taxonomy::Taxonomy;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Wires the components together: index → detect → categorize → plan → execute.
pub struct OrganizationEngine {
    config: EngineConfig,
    fusion: FusionEngine,
    rules: RuleBasedSource,
    tags: CustomTagSource,
    scanner: ContentScanner,
    detector: DuplicateDetector,
    planner: Planner,
    executor: PlanExecutor,
    pool: rayon::ThreadPool,
}

impl OrganizationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_taxonomy(config, Taxonomy::default())
    }

    pub fn with_taxonomy(config: EngineConfig, taxonomy: Taxonomy) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.hashing.workers)
            .thread_name(|i| format!("sortrs-worker-{i}"))
            .build()?;

        let fusion = FusionEngine::new(
            taxonomy,
            config.fusion.weights.clone(),
            config.fusion.parent_discount,
        );
        let scanner = ContentScanner::new(
            config.scanner.extensions.as_slice(),
            ContentHasher::new(config.hashing.normalized_size),
        );

        log::debug!(
            "Engine ready: {} worker(s), weights v{}, storage root {}",
            config.hashing.workers,
            config.fusion.weights.version,
            config.planner.storage_root.display()
        );
        Ok(Self {
            fusion,
            rules: RuleBasedSource::new(config.rules.clone()),
            tags: CustomTagSource::new(config.tags.clone()),
            scanner,
            detector: DuplicateDetector::new(config.duplicates.similarity_threshold),
            planner: Planner::new(config.planner.clone()),
            executor: PlanExecutor::new(),
            pool,
            config,
        })
    }

    pub fn storage_root(&self) -> &Path {
        &self.config.planner.storage_root
    }

    /// Rule-based candidates from `analysis` and tag candidates from the
    /// content's name and date, fused with any other sources.
    pub fn categorize(
        &self,
        content: &Content,
        analysis: &AnalysisResult,
        other_sources: &[Vec<CategoryCandidate>],
    ) -> Result<Vec<CategoryAssignment>, FusionError> {
        let mut sources = Vec::with_capacity(other_sources.len() + 2);
        sources.push(self.rules.candidates(analysis));
        sources.push(self.tags.candidates(content));
        sources.extend(other_sources.iter().cloned());
        self.fusion.fuse(&sources)
    }

    pub fn index_directory(&self, dir: &Path) -> ScanOutcome {
        self.pool.install(|| self.scanner.scan(dir))
    }

    pub fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        self.scanner.discover(dir)
    }

    pub fn index_files<F>(&self, paths: &[PathBuf], on_item: F) -> ScanOutcome
    where
        F: Fn(&Path) + Sync + Send,
    {
        self.pool.install(|| self.scanner.index_files(paths, on_item))
    }

    /// Requires every item to be hashed already.
    pub fn find_duplicates(&self, items: &[Content]) -> DuplicateReport {
        self.detector.analyze(items)
    }

    pub fn storage_summary(&self, items: &[Content], report: &DuplicateReport) -> StorageSummary {
        StorageSummary::new(items, report)
    }

    pub fn plan(
        &self,
        items: &[CategorizedContent],
        groups: &[DuplicateGroup],
        strategy: Strategy,
    ) -> OrganizationPlan {
        self.planner.plan_deduplicated(items, groups, strategy)
    }

    /// Apply `plan`, update the paths of moved `items` and journal the moves.
    pub fn execute(
        &self,
        plan: &OrganizationPlan,
        items: &mut [CategorizedContent],
    ) -> ExecutionReport {
        let report = self.pool.install(|| self.executor.execute(plan));

        report.apply_to(items);

        if !report.applied.is_empty() {
            let record = HistoryRecord::new(plan.strategy.as_str(), report.applied.clone());
            if let Err(e) = History::new(&plan.root).append(&record) {
                log::warn!("Failed to record history in {}: {}", plan.root.display(), e);
            }
        }
        report
    }

    pub fn history(&self) -> History {
        History::new(self.storage_root())
    }
}
