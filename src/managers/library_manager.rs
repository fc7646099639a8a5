//! Library Manager for Promptbook.
//!
//! Implements `LibraryManagerTrait`: CRUD over the in-memory library
//! (prompts, categories, tags and structures), persisted as one JSON document
//! in the key-value store.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::KeyValueStore;
use crate::types::errors::{LibraryError, StorageError};
use crate::types::library::{BackupData, Library, ALL_CATEGORY};
use crate::types::prompt::{ComponentTarget, Prompt, PromptComponent, Structure};

/// Key under which the whole library is persisted.
pub const LIBRARY_KEY: &str = "promptbook.library";

pub trait LibraryManagerTrait {
    fn library(&self) -> &Library;

    fn create_prompt(&mut self, prompt: Prompt) -> Result<String, LibraryError>;
    fn update_prompt(&mut self, prompt: Prompt) -> Result<(), LibraryError>;
    fn delete_prompt(&mut self, id: &str) -> Result<(), LibraryError>;
    fn get_prompt(&self, id: &str) -> Option<&Prompt>;
    fn list_prompts(&self, category: Option<&str>) -> Vec<&Prompt>;
    fn move_prompt(&mut self, from: usize, to: usize) -> Result<(), LibraryError>;

    fn add_category(&mut self, name: &str) -> Result<bool, LibraryError>;
    fn remove_category(&mut self, name: &str) -> Result<bool, LibraryError>;
    fn move_category(&mut self, from: usize, to: usize) -> Result<(), LibraryError>;

    fn add_tag(&mut self, tag: &str) -> Result<bool, LibraryError>;
    fn remove_tag(&mut self, tag: &str) -> bool;

    fn save_structure(&mut self, structure: Structure) -> Result<(), LibraryError>;
    fn delete_structure(&mut self, id: &str) -> Result<(), LibraryError>;
    fn scaffold_components(
        &self,
        structure_id: &str,
        existing: &[PromptComponent],
    ) -> Result<Vec<PromptComponent>, LibraryError>;

    fn snapshot(&self, now: DateTime<Utc>) -> BackupData;
    fn replace_library(&mut self, library: Library);
}

/// Owns the library; optionally backed by a key-value store.
pub struct LibraryManager {
    library: Library,
    store: Option<KeyValueStore>,
}

impl LibraryManager {
    /// In-memory manager, never persisted.
    pub fn new(library: Library) -> Self {
        Self { library, store: None }
    }

    /// Loads the persisted library, seeding a fresh one if nothing is stored.
    /// A stored document that no longer parses is replaced by a fresh library.
    pub fn open(store: KeyValueStore) -> Result<Self, StorageError> {
        let library = match store.get(LIBRARY_KEY)? {
            Some(raw) => match serde_json::from_str::<Library>(&raw) {
                Ok(library) => library,
                Err(e) => {
                    warn!(error = %e, "stored library unreadable, starting fresh");
                    Library::seeded()
                }
            },
            None => Library::seeded(),
        };
        Ok(Self {
            library,
            store: Some(store),
        })
    }

    /// Writes the library to the backing store, if any.
    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let json = serde_json::to_string(&self.library)
            .map_err(|e| StorageError::InvalidValue(e.to_string()))?;
        store.set(LIBRARY_KEY, &json)?;
        debug!(prompts = self.library.prompts.len(), "library persisted");
        Ok(())
    }

    fn structure(&self, id: &str) -> Result<&Structure, LibraryError> {
        self.library
            .structures
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| LibraryError::StructureNotFound(id.to_string()))
    }
}

impl LibraryManagerTrait for LibraryManager {
    fn library(&self) -> &Library {
        &self.library
    }

    /// Inserts at the front. A blank id is replaced with a fresh UUID.
    fn create_prompt(&mut self, mut prompt: Prompt) -> Result<String, LibraryError> {
        if prompt.title.trim().is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if prompt.id.trim().is_empty() || self.get_prompt(&prompt.id).is_some() {
            prompt.id = Uuid::new_v4().to_string();
        }
        prompt.normalize_tags();
        let id = prompt.id.clone();
        self.library.prompts.insert(0, prompt);
        Ok(id)
    }

    fn update_prompt(&mut self, mut prompt: Prompt) -> Result<(), LibraryError> {
        if prompt.title.trim().is_empty() {
            return Err(LibraryError::EmptyName);
        }
        prompt.normalize_tags();
        let slot = self
            .library
            .prompts
            .iter_mut()
            .find(|p| p.id == prompt.id)
            .ok_or_else(|| LibraryError::PromptNotFound(prompt.id.clone()))?;
        *slot = prompt;
        Ok(())
    }

    fn delete_prompt(&mut self, id: &str) -> Result<(), LibraryError> {
        let before = self.library.prompts.len();
        self.library.prompts.retain(|p| p.id != id);
        if self.library.prompts.len() == before {
            return Err(LibraryError::PromptNotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_prompt(&self, id: &str) -> Option<&Prompt> {
        self.library.prompts.iter().find(|p| p.id == id)
    }

    /// `None` and the "all" category list everything.
    fn list_prompts(&self, category: Option<&str>) -> Vec<&Prompt> {
        match category {
            None | Some(ALL_CATEGORY) => self.library.prompts.iter().collect(),
            Some(cat) => self.library.prompts.iter().filter(|p| p.category == cat).collect(),
        }
    }

    fn move_prompt(&mut self, from: usize, to: usize) -> Result<(), LibraryError> {
        move_item(&mut self.library.prompts, from, to)
    }

    /// Returns `false` if the category already exists.
    fn add_category(&mut self, name: &str) -> Result<bool, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if self.library.categories.iter().any(|c| c == name) {
            return Ok(false);
        }
        self.library.categories.push(name.to_string());
        Ok(true)
    }

    /// Prompts keep their category string.
    fn remove_category(&mut self, name: &str) -> Result<bool, LibraryError> {
        if name == ALL_CATEGORY {
            return Err(LibraryError::ProtectedCategory(name.to_string()));
        }
        let before = self.library.categories.len();
        self.library.categories.retain(|c| c != name);
        Ok(self.library.categories.len() != before)
    }

    /// The sentinel stays at index 0.
    fn move_category(&mut self, from: usize, to: usize) -> Result<(), LibraryError> {
        if from == 0 || to == 0 {
            return Err(LibraryError::ProtectedCategory(ALL_CATEGORY.to_string()));
        }
        move_item(&mut self.library.categories, from, to)
    }

    fn add_tag(&mut self, tag: &str) -> Result<bool, LibraryError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if self.library.tags.iter().any(|t| t == tag) {
            return Ok(false);
        }
        self.library.tags.push(tag.to_string());
        Ok(true)
    }

    fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.library.tags.len();
        self.library.tags.retain(|t| t != tag);
        self.library.tags.len() != before
    }

    /// Upsert by id; new structures are appended.
    fn save_structure(&mut self, mut structure: Structure) -> Result<(), LibraryError> {
        if structure.title.trim().is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if structure.id.trim().is_empty() {
            structure.id = Uuid::new_v4().to_string();
        }
        structure.default_components.retain(|l| !l.trim().is_empty());
        match self.library.structures.iter_mut().find(|s| s.id == structure.id) {
            Some(slot) => *slot = structure,
            None => self.library.structures.push(structure),
        }
        Ok(())
    }

    /// Prompts referencing the structure keep the dangling id.
    fn delete_structure(&mut self, id: &str) -> Result<(), LibraryError> {
        let before = self.library.structures.len();
        self.library.structures.retain(|s| s.id != id);
        if self.library.structures.len() == before {
            return Err(LibraryError::StructureNotFound(id.to_string()));
        }
        Ok(())
    }

    /// One component per default label of the structure. Components already
    /// carrying a label are reused with their id, value and target.
    fn scaffold_components(
        &self,
        structure_id: &str,
        existing: &[PromptComponent],
    ) -> Result<Vec<PromptComponent>, LibraryError> {
        let structure = self.structure(structure_id)?;
        Ok(structure
            .default_components
            .iter()
            .map(|label| {
                existing
                    .iter()
                    .find(|c| &c.label == label)
                    .cloned()
                    .unwrap_or_else(|| PromptComponent {
                        id: Uuid::new_v4().to_string(),
                        label: label.clone(),
                        value: String::new(),
                        target: ComponentTarget::System,
                    })
            })
            .collect())
    }

    fn snapshot(&self, now: DateTime<Utc>) -> BackupData {
        self.library.to_backup(now)
    }

    fn replace_library(&mut self, library: Library) {
        self.library = library;
    }
}

/// Moves the element at `from` to index `to`, keeping the relative order of
/// everything else.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), LibraryError> {
    if from >= items.len() {
        return Err(LibraryError::InvalidIndex(from));
    }
    if to >= items.len() {
        return Err(LibraryError::InvalidIndex(to));
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    Ok(())
}

/// Renders components of one target as `### label` blocks separated by blank
/// lines. Components with an empty value are skipped.
pub fn assemble_content(components: &[PromptComponent], target: ComponentTarget) -> String {
    components
        .iter()
        .filter(|c| c.target == target && !c.value.trim().is_empty())
        .map(|c| format!("### {}\n{}", c.label, c.value.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
