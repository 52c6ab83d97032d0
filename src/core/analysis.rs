use serde::{Deserialize, Serialize};

/// Per-item visual signals produced upstream. Every block is optional: a
/// missing block means the extractor failed for it, not that the signal is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub item_id: String,
    #[serde(default)]
    pub basic: Option<BasicInfo>,
    #[serde(default)]
    pub color_stats: Option<ColorStats>,
    #[serde(default)]
    pub face_stats: Option<FaceStats>,
    #[serde(default)]
    pub composition_score: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorStats {
    pub brightness_category: Brightness,
    pub contrast_category: Contrast,
    pub diversity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brightness {
    Dark,
    Normal,
    Bright,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contrast {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceStats {
    pub count: u32,
    pub has_faces: bool,
}

impl AnalysisResult {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Default::default()
        }
    }
}

impl BasicInfo {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let orientation = match width.cmp(&height) {
            std::cmp::Ordering::Greater => Orientation::Landscape,
            std::cmp::Ordering::Less => Orientation::Portrait,
            std::cmp::Ordering::Equal => Orientation::Square,
        };
        Self {
            width,
            height,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_blocks_deserialize_as_absent() {
        let json = r#"{ "itemId": "a1", "qualityScore": 0.4 }"#;
        let analysis: AnalysisResult = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.item_id, "a1");
        assert!(analysis.face_stats.is_none());
        assert!(analysis.color_stats.is_none());
        assert_eq!(analysis.quality_score, Some(0.4));
    }

    #[test]
    fn test_full_record() {
        let json = r#"{
            "itemId": "b2",
            "basic": { "width": 400, "height": 300, "orientation": "landscape" },
            "colorStats": { "brightnessCategory": "dark", "contrastCategory": "high", "diversity": 120.0 },
            "faceStats": { "count": 2, "hasFaces": true },
            "compositionScore": 0.7
        }"#;
        let analysis: AnalysisResult = serde_json::from_str(json).unwrap();

        let colors = analysis.color_stats.unwrap();
        assert_eq!(colors.brightness_category, Brightness::Dark);
        assert_eq!(colors.contrast_category, Contrast::High);
        assert_eq!(analysis.face_stats.unwrap().count, 2);
        assert_eq!(analysis.basic.unwrap().orientation, Orientation::Landscape);
    }

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(BasicInfo::from_dimensions(10, 20).orientation, Orientation::Portrait);
        assert_eq!(BasicInfo::from_dimensions(20, 20).orientation, Orientation::Square);
    }
}
