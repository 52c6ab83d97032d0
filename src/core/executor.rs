use crate::core::content::{Content, ContentId};
use crate::core::planner::{OrganizationPlan, PlannedMove};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A move that could not be applied. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub content_id: ContentId,
    pub source_path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMove {
    pub content_id: ContentId,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub folders_created: usize,
    pub items_moved: usize,
    pub errors: Vec<ExecutionError>,
    pub applied: Vec<AppliedMove>,
}

impl ExecutionReport {
    /// Point every moved item at its final location.
    pub fn apply_to<T: AsMut<Content>>(&self, items: &mut [T]) {
        let final_paths: HashMap<&str, &Path> = self
            .applied
            .iter()
            .map(|m| (m.content_id.as_str(), m.to.as_path()))
            .collect();
        for item in items.iter_mut() {
            let content = item.as_mut();
            if let Some(path) = final_paths.get(content.id.as_str()) {
                content.path = path.to_path_buf();
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

enum MoveOutcome {
    Moved(AppliedMove),
    InPlace,
    Failed(ExecutionError),
}

#[derive(Debug, Default)]
pub struct PlanExecutor;

impl PlanExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Best effort: every move is attempted and the report is always produced.
    pub fn execute(&self, plan: &OrganizationPlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for key in plan.folders.keys() {
            let folder = plan.folder_path(key);
            if folder.is_dir() {
                continue;
            }
            match fs::create_dir_all(&folder) {
                Ok(()) => report.folders_created += 1,
                Err(e) => log::warn!("Failed to create folder {}: {}", folder.display(), e),
            }
        }

        // Collision suffixes are only safe while one writer owns a folder.
        let mut by_folder: BTreeMap<PathBuf, Vec<&PlannedMove>> = BTreeMap::new();
        for planned in &plan.moves {
            let folder = planned
                .dest_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            by_folder.entry(folder).or_default().push(planned);
        }
        let batches: Vec<Vec<&PlannedMove>> = by_folder.into_values().collect();

        let outcomes: Vec<Vec<MoveOutcome>> = batches
            .par_iter()
            .map(|batch| batch.iter().map(|planned| apply_move(planned)).collect())
            .collect();

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                MoveOutcome::Moved(applied) => {
                    report.items_moved += 1;
                    report.applied.push(applied);
                }
                MoveOutcome::InPlace => {}
                MoveOutcome::Failed(error) => {
                    log::warn!(
                        "Move failed for {} ({}): {}",
                        error.content_id,
                        error.source_path.display(),
                        error.reason
                    );
                    report.errors.push(error);
                }
            }
        }

        log::info!(
            "Executed plan: {} folder(s) created, {} item(s) moved, {} error(s)",
            report.folders_created,
            report.items_moved,
            report.errors.len()
        );
        report
    }
}

fn apply_move(planned: &PlannedMove) -> MoveOutcome {
    let fail = |reason: String| {
        MoveOutcome::Failed(ExecutionError {
            content_id: planned.content_id.clone(),
            source_path: planned.source_path.clone(),
            reason,
        })
    };

    if !planned.source_path.exists() {
        return fail("source does not exist".to_string());
    }

    let dest = match free_destination(&planned.source_path, &planned.dest_path) {
        Some(dest) => dest,
        None => return MoveOutcome::InPlace,
    };

    match move_file(&planned.source_path, &dest) {
        Ok(()) => {
            log::debug!(
                "Moved {} → {}",
                planned.source_path.display(),
                dest.display()
            );
            MoveOutcome::Moved(AppliedMove {
                content_id: planned.content_id.clone(),
                from: planned.source_path.clone(),
                to: dest,
            })
        }
        Err(e) => fail(e.to_string()),
    }
}

/// First of `name.ext`, `name_1.ext`, `name_2.ext`, ... that is free.
/// `None` when a candidate already is the source file.
fn free_destination(source: &Path, dest: &Path) -> Option<PathBuf> {
    let parent = dest.parent().unwrap_or_else(|| Path::new(""));
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = dest.extension().map(|e| e.to_string_lossy().into_owned());

    let mut candidate = dest.to_path_buf();
    let mut n = 1;
    while candidate.exists() {
        if same_file(source, &candidate) {
            return None;
        }
        let name = match &extension {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        candidate = parent.join(name);
        n += 1;
    }
    Some(candidate)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Rename, falling back to copy + remove only when source and dest are on
/// different filesystems. Any other rename error is returned as is.
pub(crate) fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} and {} are on different filesystems; copying",
                source.display(),
                dest.display()
            );
            copy_then_remove(source, dest, |path| fs::remove_file(path))
        }
        Err(e) => Err(e),
    }
}

/// Copy `source` to `dest`, then remove the source. Never leaves a second
/// copy behind: `dest` is removed again if either step fails.
fn copy_then_remove<R>(source: &Path, dest: &Path, remove_source: R) -> io::Result<()>
where
    R: FnOnce(&Path) -> io::Result<()>,
{
    if let Err(e) = fs::copy(source, dest) {
        discard_copy(dest);
        return Err(e);
    }
    if let Err(e) = remove_source(source) {
        discard_copy(dest);
        return Err(e);
    }
    Ok(())
}

fn discard_copy(dest: &Path) {
    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove partial copy {}: {}", dest.display(), e),
    }
}
