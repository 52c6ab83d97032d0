use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static label hierarchy: each subcategory maps to exactly one parent.
///
/// A label listed under several parents resolves to the first parent that
/// declares it, so lookups never depend on map iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    groups: Vec<(String, Vec<String>)>,
    #[serde(skip)]
    parent_index: HashMap<String, String>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    (
        "people",
        &[
            "portrait", "group", "family", "friends", "wedding", "baby", "children",
            "professional", "selfie", "couple", "elderly",
        ],
    ),
    (
        "nature",
        &[
            "landscape", "sunset", "sunrise", "mountains", "forest", "beach", "ocean",
            "flowers", "trees", "animals", "wildlife", "sky", "clouds", "weather",
        ],
    ),
    (
        "urban",
        &[
            "city", "buildings", "architecture", "street", "transportation", "cars",
            "bridges", "nightlife", "downtown", "skyline", "modern", "vintage",
        ],
    ),
    (
        "indoor",
        &[
            "home", "kitchen", "bedroom", "living_room", "office", "restaurant",
            "shopping", "museum", "library", "gym", "hospital", "school",
        ],
    ),
    (
        "food",
        &[
            "meal", "breakfast", "lunch", "dinner", "dessert", "drinks", "cooking",
            "restaurant", "homemade", "healthy", "fast_food", "gourmet",
        ],
    ),
    (
        "events",
        &[
            "party", "celebration", "birthday", "holiday", "vacation", "travel",
            "concert", "sports", "graduation", "meeting", "conference", "festival",
        ],
    ),
    (
        "objects",
        &[
            "technology", "electronics", "tools", "furniture", "clothing", "jewelry",
            "books", "toys", "art", "decorations", "vehicles", "instruments",
        ],
    ),
    (
        "activities",
        &[
            "sports", "exercise", "reading", "cooking", "gaming", "shopping",
            "working", "studying", "traveling", "dancing", "singing", "painting",
        ],
    ),
    (
        "emotions",
        &[
            "happy", "sad", "excited", "calm", "romantic", "funny", "serious",
            "mysterious", "energetic", "peaceful", "dramatic", "nostalgic",
        ],
    ),
    (
        "style",
        &[
            "vintage", "modern", "minimalist", "colorful", "black_white", "artistic",
            "professional", "casual", "formal", "creative", "abstract", "realistic",
        ],
    ),
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("person", "people"),
    ("human", "people"),
    ("car", "vehicle"),
    ("automobile", "vehicle"),
    ("building", "architecture"),
    ("house", "home"),
    ("dog", "pet"),
    ("cat", "pet"),
];

impl Taxonomy {
    pub fn new<P, C>(groups: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let groups = groups
            .into_iter()
            .map(|(parent, children)| {
                (parent.into(), children.into_iter().map(Into::into).collect())
            })
            .collect();

        let mut taxonomy = Self {
            groups,
            parent_index: HashMap::new(),
            aliases: HashMap::new(),
        };
        taxonomy.reindex();
        taxonomy
    }

    pub fn with_aliases<K: Into<String>, V: Into<String>>(
        mut self,
        aliases: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.aliases
            .extend(aliases.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Rebuild the child → parent lookup. Needed after deserialisation.
    pub fn reindex(&mut self) {
        self.parent_index.clear();
        for (parent, children) in &self.groups {
            for child in children {
                self.parent_index
                    .entry(child.clone())
                    .or_insert_with(|| parent.clone());
            }
        }
    }

    pub fn parent_of(&self, label: &str) -> Option<&str> {
        self.parent_index.get(label).map(String::as_str)
    }

    pub fn is_parent(&self, label: &str) -> bool {
        self.groups.iter().any(|(parent, _)| parent == label)
    }

    pub fn children_of(&self, parent: &str) -> &[String] {
        self.groups
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, children)| children.as_slice())
            .unwrap_or(&[])
    }

    /// Lowercase, strip punctuation, collapse whitespace to `_`, then apply aliases.
    pub fn normalize_label(&self, raw: &str) -> String {
        let cleaned: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '_')
            .collect();
        let normalized = cleaned.split_whitespace().collect::<Vec<_>>().join("_");

        match self.aliases.get(&normalized) {
            Some(alias) => alias.clone(),
            None => normalized,
        }
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new(
            BUILTIN_GROUPS
                .iter()
                .map(|(parent, children)| (*parent, children.iter().copied())),
        )
        .with_aliases(BUILTIN_ALIASES.iter().copied())
    }
}
