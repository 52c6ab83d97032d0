use crate::core::content::Content;
use crate::core::fusion::{CategoryCandidate, SourceMethod};
use chrono::{DateTime, Datelike, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Matched against the lowercased file name.
const FILENAME_PATTERNS: [(&str, &str); 7] = [
    (r"img_(\d{8})", "date_tagged"),
    (r"screenshot", "screenshot"),
    (r"photo_(\d+)", "photo_series"),
    (r"(vacation|holiday)", "vacation"),
    (r"(birthday|bday)", "birthday"),
    (r"(wedding|marriage)", "wedding"),
    (r"(family|relatives)", "family"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub enabled: bool,
    pub filename_confidence: f64,
    pub time_confidence: f64,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename_confidence: 0.6,
            time_confidence: 0.4,
        }
    }
}

/// Tags derived from the file name and the creation time.
pub struct CustomTagSource {
    config: TagConfig,
    patterns: Vec<(Regex, &'static str)>,
}

impl CustomTagSource {
    pub fn new(config: TagConfig) -> Self {
        let patterns = FILENAME_PATTERNS
            .iter()
            .filter_map(|(pattern, tag)| match Regex::new(pattern) {
                Ok(regex) => Some((regex, *tag)),
                Err(e) => {
                    log::warn!("Ignoring tag pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { config, patterns }
    }

    pub fn filename_tags(&self, path: &Path) -> Vec<&'static str> {
        let Some(name) = path.file_name() else {
            return Vec::new();
        };
        let name = name.to_string_lossy().to_lowercase();
        let mut tags: Vec<&'static str> = Vec::new();
        for (regex, tag) in &self.patterns {
            if regex.is_match(&name) && !tags.contains(tag) {
                tags.push(*tag);
            }
        }
        tags
    }

    /// File name tags first, then time of day and season. No duplicates.
    pub fn tags(&self, path: &Path, created_at: Option<DateTime<Utc>>) -> Vec<String> {
        let mut tags: Vec<String> = self
            .filename_tags(path)
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(created) = created_at {
            for tag in [time_of_day(created.hour()), season(created.month())] {
                if !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }

    pub fn candidates(&self, content: &Content) -> Vec<CategoryCandidate> {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut candidates: Vec<CategoryCandidate> = self
            .filename_tags(&content.path)
            .into_iter()
            .map(|tag| {
                CategoryCandidate::new(tag, self.config.filename_confidence, SourceMethod::RuleBased)
            })
            .collect();
        if let Some(created) = content.created_at {
            candidates.extend(
                [time_of_day(created.hour()), season(created.month())]
                    .into_iter()
                    .map(|tag| {
                        CategoryCandidate::new(tag, self.config.time_confidence, SourceMethod::RuleBased)
                    }),
            );
        }

        log::debug!("Tag source produced {} candidates for {}", candidates.len(), content.id);
        candidates
    }
}

impl Default for CustomTagSource {
    fn default() -> Self {
        Self::new(TagConfig::default())
    }
}

pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

pub fn season(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "autumn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filename_patterns() {
        let source = CustomTagSource::default();
        assert_eq!(
            source.filename_tags(Path::new("/inbox/IMG_20230704_Vacation.jpg")),
            vec!["date_tagged", "vacation"]
        );
        assert_eq!(
            source.filename_tags(Path::new("Screenshot 2024-01-02.png")),
            vec!["screenshot"]
        );
        assert_eq!(
            source.filename_tags(Path::new("photo_12_bday_family.jpg")),
            vec!["photo_series", "birthday", "family"]
        );
        assert!(source.filename_tags(Path::new("img_2023.jpg")).is_empty());
    }

    #[test]
    fn test_directory_names_do_not_match() {
        let source = CustomTagSource::default();
        assert!(source.filename_tags(Path::new("/wedding/dsc001.jpg")).is_empty());
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(time_of_day(4), "night");
        assert_eq!(time_of_day(5), "morning");
        assert_eq!(time_of_day(11), "morning");
        assert_eq!(time_of_day(12), "afternoon");
        assert_eq!(time_of_day(16), "afternoon");
        assert_eq!(time_of_day(17), "evening");
        assert_eq!(time_of_day(20), "evening");
        assert_eq!(time_of_day(21), "night");
        assert_eq!(time_of_day(0), "night");
    }

    #[test]
    fn test_season_boundaries() {
        assert_eq!(season(12), "winter");
        assert_eq!(season(1), "winter");
        assert_eq!(season(2), "winter");
        assert_eq!(season(3), "spring");
        assert_eq!(season(5), "spring");
        assert_eq!(season(6), "summer");
        assert_eq!(season(8), "summer");
        assert_eq!(season(9), "autumn");
        assert_eq!(season(11), "autumn");
    }

    #[test]
    fn test_tags_combine_name_and_time() {
        let source = CustomTagSource::default();
        let created = Utc.with_ymd_and_hms(2023, 7, 4, 19, 30, 0).unwrap();
        assert_eq!(
            source.tags(Path::new("holiday_vacation.jpg"), Some(created)),
            vec!["vacation", "evening", "summer"]
        );
        assert!(source.tags(Path::new("dsc001.jpg"), None).is_empty());
    }

    #[test]
    fn test_candidates_use_configured_confidence() {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let content = Content::new("/inbox/wedding.jpg", 1).with_created_at(created);

        let candidates = CustomTagSource::default().candidates(&content);
        let found: Vec<(&str, f64)> = candidates
            .iter()
            .map(|c| (c.label.as_str(), c.confidence))
            .collect();
        assert_eq!(found, vec![("wedding", 0.6), ("morning", 0.4), ("winter", 0.4)]);
        assert!(candidates.iter().all(|c| c.source_method == SourceMethod::RuleBased));

        let disabled = CustomTagSource::new(TagConfig {
            enabled: false,
            ..TagConfig::default()
        });
        assert!(disabled.candidates(&content).is_empty());
    }
}
