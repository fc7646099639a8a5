use serde::{Deserialize, Serialize};

/// Which half of the conversation a component contributes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentTarget {
    #[default]
    System,
    User,
}

/// Review state of a prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    #[default]
    Verified,
    OnReview,
}

/// A labelled building block of a prompt, owned by its parent prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptComponent {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub target: ComponentTarget,
}

/// A single prompt record in the library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub system_content: String,
    #[serde(default)]
    pub user_content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    /// Weak reference to a [`Structure`]; may dangle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_id: Option<String>,
    #[serde(default)]
    pub components: Vec<PromptComponent>,
}

impl Prompt {
    /// Creates an empty prompt with the given id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: String::new(),
            tags: Vec::new(),
            system_content: String::new(),
            user_content: String::new(),
            description: String::new(),
            verification_status: VerificationStatus::default(),
            structure_id: None,
            components: Vec::new(),
        }
    }

    /// Trims tags, drops empty ones and removes duplicates keeping first occurrence.
    pub fn normalize_tags(&mut self) {
        let mut seen: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.tags = seen;
    }
}

/// A named template of component labels used to scaffold new prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default_components: Vec<String>,
}

impl Structure {
    pub fn new(id: &str, title: &str, description: &str, labels: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: Some(description.to_string()),
            default_components: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}
