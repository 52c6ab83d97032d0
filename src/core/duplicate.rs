// Duplicate detection over hashed content:
// - exact duplicates share an exact hash
// - near duplicates are within the perceptual similarity threshold of a representative

use crate::core::content::{Content, ContentId};
use crate::core::hash::ExactHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub id: String,
    pub kind: DuplicateType,
    /// First member is the representative.
    pub member_ids: Vec<ContentId>,
    /// Lowest similarity between the representative and any member.
    pub similarity: f64,
    pub wasted_space_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateType {
    Exact,
    Similar,
}

impl DuplicateGroup {
    pub fn representative(&self) -> &ContentId {
        &self.member_ids[0]
    }

    pub fn redundant(&self) -> &[ContentId] {
        &self.member_ids[1..]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    /// Items with no exact hash; they never take part in detection.
    pub skipped: Vec<ContentId>,
    pub total_wasted_bytes: u64,
}

impl DuplicateReport {
    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(|g| g.redundant().len()).sum()
    }
}

/// Totals over one indexed collection and its duplicate report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSummary {
    pub total_files: usize,
    pub total_bytes: u64,
    pub duplicates_found: usize,
    pub reclaimable_bytes: u64,
    /// `1 - duplicates_found / total_files`; 1.0 for an empty collection.
    pub storage_efficiency: f64,
}

impl StorageSummary {
    pub fn new(items: &[Content], report: &DuplicateReport) -> Self {
        let total_files = items.len();
        let duplicates_found = report.duplicate_count();
        Self {
            total_files,
            total_bytes: items.iter().map(|c| c.size_bytes).sum(),
            duplicates_found,
            reclaimable_bytes: report.total_wasted_bytes,
            storage_efficiency: 1.0 - duplicates_found as f64 / total_files.max(1) as f64,
        }
    }
}

pub struct DuplicateDetector {
    pub threshold: f64,
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn detect(&self, items: &[Content]) -> Vec<DuplicateGroup> {
        self.analyze(items).groups
    }

    /// Exact pass then perceptual pass. `processed` is the visited set shared by
    /// both passes, so an item can only ever join one group.
    pub fn analyze(&self, items: &[Content]) -> DuplicateReport {
        let mut processed = vec![false; items.len()];
        let mut groups = Vec::new();
        let mut skipped = Vec::new();

        let mut buckets: HashMap<&ExactHash, Vec<usize>> = HashMap::new();
        let mut bucket_order: Vec<&ExactHash> = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match &item.exact_hash {
                Some(hash) => {
                    let bucket = buckets.entry(hash).or_default();
                    if bucket.is_empty() {
                        bucket_order.push(hash);
                    }
                    bucket.push(idx);
                }
                None => {
                    processed[idx] = true;
                    skipped.push(item.id.clone());
                }
            }
        }

        for hash in bucket_order {
            let members = &buckets[hash];
            if members.len() < 2 {
                continue;
            }
            for &idx in members {
                processed[idx] = true;
            }
            groups.push(build_group(items, members, DuplicateType::Exact, 1.0));
        }
        let exact_groups = groups.len();

        for a in 0..items.len() {
            if processed[a] {
                continue;
            }
            let Some(hash_a) = items[a].perceptual_hash else {
                continue;
            };

            let mut members = vec![a];
            let mut lowest = 1.0_f64;
            for b in (a + 1)..items.len() {
                if processed[b] {
                    continue;
                }
                let Some(hash_b) = items[b].perceptual_hash else {
                    continue;
                };
                let similarity = hash_a.similarity(&hash_b);
                if similarity >= self.threshold {
                    members.push(b);
                    lowest = lowest.min(similarity);
                }
            }

            if members.len() > 1 {
                for &idx in &members {
                    processed[idx] = true;
                }
                groups.push(build_group(items, &members, DuplicateType::Similar, lowest));
            }
        }

        if !skipped.is_empty() {
            log::warn!("{} item(s) without an exact hash skipped", skipped.len());
        }
        log::info!(
            "Duplicate detection: {} exact group(s), {} similar group(s) across {} item(s)",
            exact_groups,
            groups.len() - exact_groups,
            items.len()
        );

        let total_wasted_bytes = groups.iter().map(|g| g.wasted_space_bytes).sum();
        DuplicateReport {
            groups,
            skipped,
            total_wasted_bytes,
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(0.95)
    }
}

fn build_group(
    items: &[Content],
    members: &[usize],
    kind: DuplicateType,
    similarity: f64,
) -> DuplicateGroup {
    let wasted_space_bytes = members[1..].iter().map(|&i| items[i].size_bytes).sum();
    DuplicateGroup {
        id: format!("grp_{}", Uuid::new_v4().simple()),
        kind,
        member_ids: members.iter().map(|&i| items[i].id.clone()).collect(),
        similarity,
        wasted_space_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::PerceptualHash;
    use std::collections::HashSet;

    fn item(id: &str, size: u64, exact: &str, perceptual: Option<u64>) -> Content {
        Content::new(format!("/photos/{id}.jpg"), size)
            .with_id(id)
            .with_hashes(ExactHash(exact.to_string()), perceptual.map(PerceptualHash))
    }

    #[test]
    fn test_three_identical_items_form_one_exact_group() {
        let items = vec![
            item("a", 500, "h1", Some(0)),
            item("b", 500, "h1", Some(0)),
            item("c", 500, "h1", Some(0)),
        ];
        let groups = DuplicateDetector::default().detect(&items);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, DuplicateType::Exact);
        assert_eq!(groups[0].member_ids, vec!["a", "b", "c"]);
        assert_eq!(groups[0].representative(), "a");
        assert_eq!(groups[0].wasted_space_bytes, 2 * 500);
        assert_eq!(groups[0].similarity, 1.0);
    }

    #[test]
    fn test_perceptual_threshold_boundary() {
        let items = vec![
            item("a", 10, "h1", Some(0)),
            item("b", 20, "h2", Some(0b111)),
            item("c", 30, "h3", Some(0xF000_0000_0000_0000)),
            item("d", 40, "h4", Some(0xF000_0000_0000_0000 ^ 0b1111)),
        ];
        let groups = DuplicateDetector::new(0.95).detect(&items);

        // a/b differ by 3 bits (0.953), c/d by 4 bits (0.9375)
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, DuplicateType::Similar);
        assert_eq!(groups[0].member_ids, vec!["a", "b"]);
        assert_eq!(groups[0].wasted_space_bytes, 20);
        assert!((groups[0].similarity - 0.953125).abs() < 1e-12);
    }

    #[test]
    fn test_unique_items_are_absent() {
        let items = vec![
            item("a", 1, "h1", Some(0)),
            item("b", 1, "h2", Some(u64::MAX)),
        ];
        assert!(DuplicateDetector::default().detect(&items).is_empty());
    }

    #[test]
    fn test_groups_partition_input() {
        // x is within threshold of both a and b, and a/b are exact duplicates
        let items = vec![
            item("a", 1, "h1", Some(0)),
            item("x", 1, "h9", Some(0b1)),
            item("b", 1, "h1", Some(0)),
            item("y", 1, "h8", Some(0b11)),
            item("z", 1, "h7", Some(0b111)),
            item("w", 1, "h6", Some(0b110)),
        ];
        let report = DuplicateDetector::new(0.95).analyze(&items);

        let mut seen = HashSet::new();
        for group in &report.groups {
            for id in &group.member_ids {
                assert!(seen.insert(id.clone()), "{id} appears in two groups");
            }
        }
        assert_eq!(report.groups[0].member_ids, vec!["a", "b"]);
        assert_eq!(report.groups[1].member_ids, vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn test_missing_hashes() {
        let mut unreadable = Content::new("/photos/u.jpg", 9).with_id("u");
        unreadable.exact_hash = None;
        let items = vec![
            unreadable,
            item("a", 5, "h1", None),
            item("b", 5, "h2", None),
            item("c", 5, "h1", None),
        ];
        let report = DuplicateDetector::default().analyze(&items);

        assert_eq!(report.skipped, vec!["u"]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].member_ids, vec!["a", "c"]);
        assert_eq!(report.total_wasted_bytes, 5);
        assert_eq!(report.duplicate_count(), 1);
    }

    #[test]
    fn test_empty_input() {
        let report = DuplicateDetector::default().analyze(&[]);
        assert!(report.groups.is_empty());
        assert_eq!(report.total_wasted_bytes, 0);
    }

    #[test]
    fn test_storage_summary() {
        let items = vec![
            item("a", 500, "h1", None),
            item("b", 500, "h1", None),
            item("c", 500, "h1", None),
            item("d", 100, "h2", None),
        ];
        let report = DuplicateDetector::default().analyze(&items);
        let summary = StorageSummary::new(&items, &report);

        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.total_bytes, 1600);
        assert_eq!(summary.duplicates_found, 2);
        assert_eq!(summary.reclaimable_bytes, 1000);
        assert!((summary.storage_efficiency - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_storage_summary_of_empty_collection() {
        let summary = StorageSummary::new(&[], &DuplicateReport::default());
        assert_eq!(summary.total_files, 0);
        assert_eq!(summary.duplicates_found, 0);
        assert_eq!(summary.storage_efficiency, 1.0);
    }
}
