use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse, path-derived file classification. This is a heuristic: the first
/// rule in [`CATEGORY_RULES`] whose segment appears in the path wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Backend,
    Component,
    Util,
    Page,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Component => "component",
            Self::Util => "util",
            Self::Page => "page",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backend" => Some(Self::Backend),
            "component" => Some(Self::Component),
            "util" => Some(Self::Util),
            "page" => Some(Self::Page),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const CATEGORY_RULES: &[(&str, Category)] = &[
    ("apis", Category::Backend),
    ("components", Category::Component),
    ("utils", Category::Util),
    ("pages", Category::Page),
];

/// First rule whose name is a whole `/`-separated segment of `path`. This is
/// deliberately stricter than substring matching: `src/utils.ts` and
/// `src/myapis/x.py` are both `Other`.
pub fn categorize(path: &str) -> Category {
    CATEGORY_RULES
        .iter()
        .find(|(segment, _)| path.split('/').any(|part| part == *segment))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}
