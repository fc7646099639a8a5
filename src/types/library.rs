use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::prompt::{Prompt, Structure};

/// The "no filter" category. Always present, always first, never removed.
pub const ALL_CATEGORY: &str = "Все";

/// Categories every fresh library starts with, after [`ALL_CATEGORY`].
pub const DEFAULT_CATEGORIES: [&str; 5] = [
    "Ролевые модели",
    "Работа с текстом",
    "Генерация идей",
    "Технические / Код",
    "Визуал / Изображения",
];

/// The in-memory dataset: four related collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Library {
    pub prompts: Vec<Prompt>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub structures: Vec<Structure>,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            prompts: Vec::new(),
            categories: vec![ALL_CATEGORY.to_string()],
            tags: Vec::new(),
            structures: Vec::new(),
        }
    }
}

impl Library {
    /// A fresh library with the standard categories and built-in structures.
    pub fn seeded() -> Self {
        let mut categories = vec![ALL_CATEGORY.to_string()];
        categories.extend(DEFAULT_CATEGORIES.iter().map(|c| c.to_string()));
        Self {
            prompts: Vec::new(),
            categories,
            tags: Vec::new(),
            structures: builtin_structures(),
        }
    }

    /// Captures the whole library as an exportable snapshot.
    pub fn to_backup(&self, last_updated: DateTime<Utc>) -> BackupData {
        BackupData {
            prompts: self.prompts.clone(),
            categories: self.categories.clone(),
            tags: self.tags.clone(),
            structures: self.structures.clone(),
            last_updated,
        }
    }
}

/// Exportable/importable snapshot; the unit of cloud sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    // Older exports predate structures.
    #[serde(default)]
    pub structures: Vec<Structure>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl BackupData {
    /// Serializes to the canonical pretty-printed JSON backup document.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// COSTAR, TAG, RTF and Midjourney templates.
pub fn builtin_structures() -> Vec<Structure> {
    vec![
        Structure::new(
            "costar",
            "COSTAR Framework",
            "Context, Objective, Style, Tone, Audience, Response Format",
            &["Context", "Objective", "Style", "Tone", "Audience", "Response Format"],
        ),
        Structure::new(
            "tag",
            "TAG Framework",
            "Task, Action, Goal",
            &["Task", "Action", "Goal", "Context"],
        ),
        Structure::new(
            "rtf",
            "RTF Framework",
            "Role, Task, Format",
            &["Role", "Task", "Format", "Constraints"],
        ),
        Structure::new(
            "midjourney",
            "Midjourney Standard",
            "Subject, Medium, Style, Parameters",
            &[
                "Subject",
                "Medium",
                "Environment",
                "Lighting",
                "Color",
                "Mood",
                "Composition",
                "Parameters (--ar, --v)",
            ],
        ),
    ]
}
