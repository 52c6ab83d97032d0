use crate::core::taxonomy::Taxonomy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("No weight configured for source method: {0}")]
    UnknownMethod(SourceMethod),

    #[error("Invalid weight {weight} for source method {method}")]
    InvalidWeight { method: SourceMethod, weight: f64 },
}

/// Extraction method that produced a candidate. Closed set; each needs a weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMethod {
    RuleBased,
    AiClassification,
    ObjectDetection,
    MlClassification,
    SimilarityBased,
}

impl SourceMethod {
    pub const ALL: [SourceMethod; 5] = [
        SourceMethod::RuleBased,
        SourceMethod::AiClassification,
        SourceMethod::ObjectDetection,
        SourceMethod::MlClassification,
        SourceMethod::SimilarityBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMethod::RuleBased => "rule_based",
            SourceMethod::AiClassification => "ai_classification",
            SourceMethod::ObjectDetection => "object_detection",
            SourceMethod::MlClassification => "ml_classification",
            SourceMethod::SimilarityBased => "similarity_based",
        }
    }
}

impl fmt::Display for SourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCandidate {
    pub label: String,
    pub confidence: f64,
    pub source_method: SourceMethod,
}

impl CategoryCandidate {
    pub fn new(label: impl Into<String>, confidence: f64, source_method: SourceMethod) -> Self {
        Self {
            label: label.into(),
            confidence,
            source_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    Parent,
    Subcategory,
    Standalone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssignment {
    pub label: String,
    pub confidence: f64,
    #[serde(rename = "type")]
    pub kind: AssignmentType,
    pub parent_label: Option<String>,
    pub contributing_methods: BTreeSet<SourceMethod>,
}

/// Versioned `SourceMethod → weight` table injected into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodWeights {
    pub version: u32,
    pub weights: BTreeMap<SourceMethod, f64>,
}

impl MethodWeights {
    pub fn weight(&self, method: SourceMethod) -> Result<f64, FusionError> {
        self.weights
            .get(&method)
            .copied()
            .ok_or(FusionError::UnknownMethod(method))
    }

    pub fn validate(&self) -> Result<(), FusionError> {
        for (&method, &weight) in &self.weights {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(FusionError::InvalidWeight { method, weight });
            }
        }
        Ok(())
    }
}

impl Default for MethodWeights {
    fn default() -> Self {
        Self {
            version: 1,
            weights: BTreeMap::from([
                (SourceMethod::RuleBased, 1.0),
                (SourceMethod::AiClassification, 0.9),
                (SourceMethod::ObjectDetection, 0.8),
                (SourceMethod::MlClassification, 0.7),
                (SourceMethod::SimilarityBased, 0.6),
            ]),
        }
    }
}

/// Merges candidate lists from independent sources into one ranked,
/// de-duplicated, hierarchy-aware assignment list.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    taxonomy: Taxonomy,
    weights: MethodWeights,
    parent_discount: f64,
}

#[derive(Default)]
struct Tally {
    votes: Vec<(f64, f64)>,
    methods: BTreeSet<SourceMethod>,
}

impl FusionEngine {
    pub fn new(taxonomy: Taxonomy, weights: MethodWeights, parent_discount: f64) -> Self {
        Self {
            taxonomy,
            weights,
            parent_discount,
        }
    }

    pub fn fuse(
        &self,
        sources: &[Vec<CategoryCandidate>],
    ) -> Result<Vec<CategoryAssignment>, FusionError> {
        let ranked = self.rank(sources)?;
        let mut assignments = self.expand_hierarchy(ranked);
        assignments.sort_by(rank_order);

        log::debug!("Fused {} categories from {} sources", assignments.len(), sources.len());
        Ok(assignments)
    }

    /// Group by normalised label and combine with the weighted mean.
    fn rank(
        &self,
        sources: &[Vec<CategoryCandidate>],
    ) -> Result<Vec<CategoryAssignment>, FusionError> {
        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

        for candidate in sources.iter().flatten() {
            let weight = self.weights.weight(candidate.source_method)?;

            if !candidate.confidence.is_finite() {
                log::warn!(
                    "Dropping non-finite confidence for '{}' from {}",
                    candidate.label,
                    candidate.source_method
                );
                continue;
            }

            let label = self.taxonomy.normalize_label(&candidate.label);
            if label.is_empty() {
                continue;
            }

            let tally = tallies.entry(label).or_default();
            tally.votes.push((candidate.confidence.clamp(0.0, 1.0), weight));
            tally.methods.insert(candidate.source_method);
        }

        let mut ranked: Vec<CategoryAssignment> = tallies
            .into_iter()
            .map(|(label, mut tally)| {
                // fixed summation order keeps the result independent of source order
                tally
                    .votes
                    .sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                let weighted_sum: f64 = tally.votes.iter().map(|(c, w)| c * w).sum();
                let total_weight: f64 = tally.votes.iter().map(|(_, w)| w).sum();
                let confidence = if total_weight > 0.0 {
                    weighted_sum / total_weight
                } else {
                    0.0
                };

                CategoryAssignment {
                    label,
                    confidence,
                    kind: AssignmentType::Standalone,
                    parent_label: None,
                    contributing_methods: tally.methods,
                }
            })
            .collect();

        ranked.sort_by(rank_order);
        Ok(ranked)
    }

    fn expand_hierarchy(&self, ranked: Vec<CategoryAssignment>) -> Vec<CategoryAssignment> {
        let mut assignments = ranked;
        let mut index: HashMap<String, usize> = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| (a.label.clone(), i))
            .collect();

        for assignment in &mut assignments {
            if let Some(parent) = self.taxonomy.parent_of(&assignment.label) {
                assignment.kind = AssignmentType::Subcategory;
                assignment.parent_label = Some(parent.to_string());
            }
        }

        // Ranked order means the strongest child of a missing parent synthesises it.
        // Synthesised entries are appended and visited too, so deeper chains resolve.
        let mut cursor = 0;
        while cursor < assignments.len() {
            let current = &assignments[cursor];
            if let Some(parent) = current.parent_label.as_deref() {
                if !index.contains_key(parent) {
                    let synthesized = CategoryAssignment {
                        label: parent.to_string(),
                        confidence: current.confidence * self.parent_discount,
                        kind: AssignmentType::Parent,
                        parent_label: self.taxonomy.parent_of(parent).map(str::to_string),
                        contributing_methods: current.contributing_methods.clone(),
                    };
                    index.insert(synthesized.label.clone(), assignments.len());
                    assignments.push(synthesized);
                }
            }
            cursor += 1;
        }

        let referenced: BTreeSet<String> = assignments
            .iter()
            .filter_map(|a| a.parent_label.clone())
            .collect();
        for assignment in &mut assignments {
            if referenced.contains(&assignment.label) {
                assignment.kind = AssignmentType::Parent;
            }
        }

        assignments
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(Taxonomy::default(), MethodWeights::default(), 0.8)
    }
}

/// Confidence descending, then method count descending, then label ascending.
fn rank_order(a: &CategoryAssignment, b: &CategoryAssignment) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| {
            b.contributing_methods
                .len()
                .cmp(&a.contributing_methods.len())
        })
        .then_with(|| a.label.cmp(&b.label))
}

/// Parent label → labels of its subcategories present in `assignments`.
pub fn hierarchy_view(assignments: &[CategoryAssignment]) -> BTreeMap<String, Vec<String>> {
    let mut view: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for assignment in assignments {
        if assignment.kind == AssignmentType::Parent {
            view.entry(assignment.label.clone()).or_default();
        }
    }
    for assignment in assignments {
        if let Some(parent) = &assignment.parent_label {
            if let Some(children) = view.get_mut(parent) {
                children.push(assignment.label.clone());
            }
        }
    }
    view
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub std_dev: f64,
    pub median: f64,
}

impl ConfidenceSummary {
    pub fn from_assignments(assignments: &[CategoryAssignment]) -> Option<Self> {
        if assignments.is_empty() {
            return None;
        }

        let mut scores: Vec<f64> = assignments.iter().map(|a| a.confidence).collect();
        scores.sort_by(f64::total_cmp);

        let count = scores.len() as f64;
        let average = scores.iter().sum::<f64>() / count;
        let variance = scores.iter().map(|s| (s - average).powi(2)).sum::<f64>() / count;
        let mid = scores.len() / 2;
        let median = if scores.len() % 2 == 0 {
            (scores[mid - 1] + scores[mid]) / 2.0
        } else {
            scores[mid]
        };

        Some(Self {
            average,
            max: scores[scores.len() - 1],
            min: scores[0],
            std_dev: variance.sqrt(),
            median,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn candidate(label: &str, confidence: f64, method: SourceMethod) -> CategoryCandidate {
        CategoryCandidate::new(label, confidence, method)
    }

    fn find<'a>(out: &'a [CategoryAssignment], label: &str) -> &'a CategoryAssignment {
        out.iter()
            .find(|a| a.label == label)
            .unwrap_or_else(|| panic!("missing label {label}"))
    }

    #[test]
    fn test_empty_sources_yield_empty_result() {
        let engine = FusionEngine::default();
        assert!(engine.fuse(&[]).unwrap().is_empty());
        assert!(engine.fuse(&[vec![], vec![]]).unwrap().is_empty());
    }

    #[test]
    fn test_weighted_mean_across_methods() {
        let engine = FusionEngine::default();
        let sources = vec![
            vec![candidate("sunset", 0.6, SourceMethod::RuleBased)],
            vec![candidate("sunset", 0.9, SourceMethod::SimilarityBased)],
        ];
        let out = engine.fuse(&sources).unwrap();
        let sunset = find(&out, "sunset");

        let expected = (0.6 * 1.0 + 0.9 * 0.6) / (1.0 + 0.6);
        assert!((sunset.confidence - expected).abs() < EPS);
        assert_eq!(sunset.contributing_methods.len(), 2);
    }

    #[test]
    fn test_ranking_is_non_increasing() {
        let engine = FusionEngine::default();
        let sources = vec![
            vec![
                candidate("sunset", 0.4, SourceMethod::RuleBased),
                candidate("portrait", 0.95, SourceMethod::RuleBased),
                candidate("cars", 0.7, SourceMethod::RuleBased),
            ],
            vec![
                candidate("spaceship", 0.5, SourceMethod::ObjectDetection),
                candidate("family", 0.66, SourceMethod::MlClassification),
            ],
        ];
        let out = engine.fuse(&sources).unwrap();

        assert!(out.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_labels_are_unique() {
        let engine = FusionEngine::default();
        let sources = vec![
            vec![
                candidate("portrait", 0.8, SourceMethod::RuleBased),
                candidate("People", 0.5, SourceMethod::RuleBased),
            ],
            vec![
                candidate("person", 0.7, SourceMethod::AiClassification),
                candidate("selfie", 0.9, SourceMethod::AiClassification),
            ],
        ];
        let out = engine.fuse(&sources).unwrap();

        let labels: BTreeSet<&str> = out.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels.len(), out.len());
        assert_eq!(out.iter().filter(|a| a.label == "people").count(), 1);
    }

    #[test]
    fn test_synthesized_parent_is_discounted() {
        let engine = FusionEngine::default();
        let sources = vec![vec![candidate("sunset", 0.75, SourceMethod::RuleBased)]];
        let out = engine.fuse(&sources).unwrap();

        let parent = find(&out, "nature");
        assert_eq!(parent.kind, AssignmentType::Parent);
        assert!((parent.confidence - 0.75 * 0.8).abs() < EPS);

        let child = find(&out, "sunset");
        assert_eq!(child.kind, AssignmentType::Subcategory);
        assert_eq!(child.parent_label.as_deref(), Some("nature"));
        assert_eq!(out[0].label, "sunset");
    }

    #[test]
    fn test_strongest_child_determines_synthesized_parent() {
        let engine = FusionEngine::default();
        let sources = vec![vec![
            candidate("beach", 0.5, SourceMethod::RuleBased),
            candidate("ocean", 0.9, SourceMethod::RuleBased),
        ]];
        let out = engine.fuse(&sources).unwrap();

        let parent = find(&out, "nature");
        assert!((parent.confidence - 0.9 * 0.8).abs() < EPS);
        assert_eq!(out.iter().filter(|a| a.label == "nature").count(), 1);
    }

    #[test]
    fn test_parent_already_voted_is_not_duplicated() {
        let engine = FusionEngine::default();
        let sources = vec![
            vec![candidate("people", 0.9, SourceMethod::RuleBased)],
            vec![candidate("portrait", 0.8, SourceMethod::AiClassification)],
        ];
        let out = engine.fuse(&sources).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "people");
        assert!(out[0].confidence >= 0.9 - EPS);
        assert_eq!(out[0].kind, AssignmentType::Parent);

        assert_eq!(out[1].label, "portrait");
        assert!((out[1].confidence - 0.8).abs() < EPS);
        assert_eq!(out[1].kind, AssignmentType::Subcategory);
        assert_eq!(out[1].parent_label.as_deref(), Some("people"));
    }

    #[test]
    fn test_unknown_label_is_standalone() {
        let engine = FusionEngine::default();
        let sources = vec![vec![candidate("spaceship", 0.6, SourceMethod::ObjectDetection)]];
        let out = engine.fuse(&sources).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, AssignmentType::Standalone);
        assert!(out[0].parent_label.is_none());
    }

    #[test]
    fn test_input_order_does_not_change_output() {
        let engine = FusionEngine::default();
        let a = vec![
            candidate("portrait", 0.8, SourceMethod::AiClassification),
            candidate("sunset", 0.3, SourceMethod::AiClassification),
        ];
        let b = vec![
            candidate("people", 0.6, SourceMethod::RuleBased),
            candidate("portrait", 0.7, SourceMethod::RuleBased),
        ];
        let c = vec![candidate("family", 0.8, SourceMethod::MlClassification)];

        let forward = engine.fuse(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let mut reversed_a = a.clone();
        reversed_a.reverse();
        let backward = engine.fuse(&[c, b, reversed_a]).unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_ties_break_by_method_count_then_label() {
        let engine = FusionEngine::default();
        let sources = vec![
            vec![
                candidate("zebra", 1.0, SourceMethod::RuleBased),
                candidate("apple", 1.0, SourceMethod::RuleBased),
                candidate("mango", 1.0, SourceMethod::RuleBased),
            ],
            vec![candidate("mango", 1.0, SourceMethod::ObjectDetection)],
        ];
        let out = engine.fuse(&sources).unwrap();
        let labels: Vec<&str> = out.iter().map(|a| a.label.as_str()).collect();

        assert_eq!(labels, vec!["mango", "apple", "zebra"]);
    }

    #[test]
    fn test_missing_weight_is_an_error() {
        let mut weights = MethodWeights::default();
        weights.weights.remove(&SourceMethod::SimilarityBased);
        let engine = FusionEngine::new(Taxonomy::default(), weights, 0.8);

        let sources = vec![vec![candidate("sky", 0.5, SourceMethod::SimilarityBased)]];
        let err = engine.fuse(&sources).unwrap_err();
        assert!(matches!(err, FusionError::UnknownMethod(SourceMethod::SimilarityBased)));
    }

    #[test]
    fn test_malformed_confidences_do_not_fail() {
        let engine = FusionEngine::default();
        let sources = vec![vec![
            candidate("sky", f64::NAN, SourceMethod::RuleBased),
            candidate("clouds", 1.7, SourceMethod::RuleBased),
            candidate("", 0.4, SourceMethod::RuleBased),
        ]];
        let out = engine.fuse(&sources).unwrap();

        assert!(out.iter().all(|a| a.label != "sky"));
        assert!((find(&out, "clouds").confidence - 1.0).abs() < EPS);
        assert!(out.iter().all(|a| !a.label.is_empty()));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let mut weights = MethodWeights::default();
        weights.weights.insert(SourceMethod::RuleBased, 0.0);
        assert!(matches!(
            weights.validate(),
            Err(FusionError::InvalidWeight { .. })
        ));
        assert!(MethodWeights::default().validate().is_ok());
    }

    #[test]
    fn test_hierarchy_view_and_summary() {
        let engine = FusionEngine::default();
        let sources = vec![vec![
            candidate("portrait", 0.8, SourceMethod::RuleBased),
            candidate("selfie", 0.6, SourceMethod::RuleBased),
            candidate("spaceship", 0.4, SourceMethod::RuleBased),
        ]];
        let out = engine.fuse(&sources).unwrap();

        let view = hierarchy_view(&out);
        assert_eq!(view.len(), 1);
        assert_eq!(view["people"], vec!["portrait".to_string(), "selfie".to_string()]);

        let summary = ConfidenceSummary::from_assignments(&out).unwrap();
        assert!((summary.max - 0.8).abs() < EPS);
        assert!((summary.min - 0.4).abs() < EPS);
        assert!(ConfidenceSummary::from_assignments(&[]).is_none());
    }
}
