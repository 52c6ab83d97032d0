use crate::core::analysis::{AnalysisResult, Brightness, Contrast};
use crate::core::fusion::{CategoryCandidate, SourceMethod};
use serde::{Deserialize, Serialize};

/// Thresholds for the heuristic candidate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub high_quality: f64,
    pub low_quality: f64,
    pub colorful_diversity: f64,
    pub group_min_faces: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            high_quality: 0.8,
            low_quality: 0.3,
            colorful_diversity: 100.0,
            group_min_faces: 2,
        }
    }
}

/// Heuristics over an [`AnalysisResult`]. A rule whose signal block is absent abstains.
pub struct RuleBasedSource {
    config: RuleConfig,
}

impl RuleBasedSource {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    pub fn candidates(&self, analysis: &AnalysisResult) -> Vec<CategoryCandidate> {
        let mut candidates = Vec::new();
        let mut vote = |labels: &[&str], confidence: f64| {
            candidates.extend(
                labels
                    .iter()
                    .map(|label| CategoryCandidate::new(*label, confidence, SourceMethod::RuleBased)),
            );
        };

        if let Some(faces) = &analysis.face_stats {
            if faces.has_faces {
                vote(&["people", "portrait"], 0.9);
            }
            if faces.count >= self.config.group_min_faces {
                vote(&["group", "family", "friends"], 0.8);
            }
        }

        if let Some(quality) = analysis.quality_score.filter(|q| q.is_finite()) {
            if quality >= self.config.high_quality {
                vote(&["high_quality", "professional"], 0.8);
            } else if quality < self.config.low_quality {
                vote(&["blurry", "low_quality"], 0.9);
            }
        }

        if let Some(colors) = &analysis.color_stats {
            if colors.diversity > self.config.colorful_diversity
                || colors.contrast_category == Contrast::High
            {
                vote(&["colorful", "vibrant"], 0.7);
            }
            match colors.brightness_category {
                Brightness::Dark => vote(&["dark", "moody", "night"], 0.8),
                Brightness::Bright => vote(&["bright", "cheerful", "day"], 0.8),
                Brightness::Normal => {}
            }
        }

        log::debug!(
            "Rule-based source produced {} candidates for {}",
            candidates.len(),
            analysis.item_id
        );
        candidates
    }
}

impl Default for RuleBasedSource {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{ColorStats, FaceStats};

    fn labels(candidates: &[CategoryCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn test_absent_blocks_abstain() {
        let source = RuleBasedSource::default();
        let analysis = AnalysisResult::new("empty");
        assert!(source.candidates(&analysis).is_empty());
    }

    #[test]
    fn test_zero_faces_is_not_absent_faces() {
        let source = RuleBasedSource::default();
        let mut analysis = AnalysisResult::new("x");
        analysis.face_stats = Some(FaceStats {
            count: 0,
            has_faces: false,
        });
        assert!(source.candidates(&analysis).is_empty());
    }

    #[test]
    fn test_group_photo_rules() {
        let source = RuleBasedSource::default();
        let mut analysis = AnalysisResult::new("g");
        analysis.face_stats = Some(FaceStats {
            count: 3,
            has_faces: true,
        });

        let out = source.candidates(&analysis);
        assert_eq!(
            labels(&out),
            vec!["people", "portrait", "group", "family", "friends"]
        );
        assert!(out.iter().all(|c| c.source_method == SourceMethod::RuleBased));
        assert_eq!(out[0].confidence, 0.9);
        assert_eq!(out[2].confidence, 0.8);
    }

    #[test]
    fn test_quality_and_color_rules() {
        let source = RuleBasedSource::default();
        let mut analysis = AnalysisResult::new("q");
        analysis.quality_score = Some(0.1);
        analysis.color_stats = Some(ColorStats {
            brightness_category: Brightness::Dark,
            contrast_category: Contrast::High,
            diversity: 20.0,
        });

        let out = source.candidates(&analysis);
        assert_eq!(
            labels(&out),
            vec!["blurry", "low_quality", "colorful", "vibrant", "dark", "moody", "night"]
        );
    }

    #[test]
    fn test_high_quality_rule() {
        let source = RuleBasedSource::default();
        let mut analysis = AnalysisResult::new("h");
        analysis.quality_score = Some(0.85);
        assert_eq!(
            labels(&source.candidates(&analysis)),
            vec!["high_quality", "professional"]
        );
    }
}
