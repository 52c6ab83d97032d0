use crate::core::content::Content;
use crate::core::hash::ContentHasher;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub items: Vec<Content>,
    /// Files that could not be read, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Walks a directory and turns every supported file into a hashed [`Content`].
pub struct ContentScanner {
    extensions: HashSet<String>,
    hasher: ContentHasher,
}

impl ContentScanner {
    pub fn new<S: AsRef<str>>(extensions: &[S], hasher: ContentHasher) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            hasher,
        }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// Supported files under `dir`, sorted so repeated scans agree on order.
    pub fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        log::debug!("Discovered {} file(s) under {}", files.len(), dir.display());
        files
    }

    pub fn scan(&self, dir: &Path) -> ScanOutcome {
        let files = self.discover(dir);
        self.index_files(&files, |_| {})
    }

    /// Hash `paths` in parallel. `on_item` runs once per file from worker threads.
    pub fn index_files<F>(&self, paths: &[PathBuf], on_item: F) -> ScanOutcome
    where
        F: Fn(&Path) + Sync,
    {
        let results: Vec<Result<Content, (PathBuf, String)>> = paths
            .par_iter()
            .map(|path| {
                let result = self.index_file(path);
                on_item(path);
                result.map_err(|reason| (path.clone(), reason))
            })
            .collect();

        let mut outcome = ScanOutcome::default();
        for result in results {
            match result {
                Ok(content) => outcome.items.push(content),
                Err((path, reason)) => {
                    log::warn!("Skipping {}: {}", path.display(), reason);
                    outcome.skipped.push((path, reason));
                }
            }
        }
        log::info!(
            "Indexed {} item(s), skipped {}",
            outcome.items.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn index_file(&self, path: &Path) -> Result<Content, String> {
        let metadata = fs::metadata(path).map_err(|e| e.to_string())?;
        let hashes = self.hasher.hash_file(path).map_err(|e| e.to_string())?;

        let mut content = Content::new(path, metadata.len())
            .with_hashes(hashes.exact_hash, hashes.perceptual_hash);
        if let Ok(time) = metadata.created().or_else(|_| metadata.modified()) {
            content = content.with_created_at(DateTime::<Utc>::from(time));
        }
        Ok(content)
    }
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new(&DEFAULT_EXTENSIONS, ContentHasher::default())
    }
}
