//! Import Merge Engine for Promptbook.
//!
//! Reconciles an imported snapshot with the current library under one of two
//! policies. Every function is pure: the result is computed fully in memory
//! and the caller swaps it in as a whole.
//!
//! - **Replace**: the library becomes the imported one; structures are kept
//!   when the import carries none (older export formats).
//! - **Merge**: upsert by id for prompts and structures (imported wins),
//!   ordered set union for categories and tags.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::errors::SyncError;
use crate::types::library::{BackupData, Library, ALL_CATEGORY};
use crate::types::prompt::{Prompt, Structure};

/// How an import is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    Replace,
    Merge,
}

/// Summary used to build the confirmation prompt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportPlan {
    pub prompt_count: usize,
    /// Imported prompts whose id is not in the current library.
    pub new_prompts: usize,
    /// Imported prompts that would overwrite an existing one on merge.
    pub updated_prompts: usize,
    pub structure_count: usize,
}

impl ImportPlan {
    pub fn is_empty(&self) -> bool {
        self.prompt_count == 0
    }
}

/// Inspects an import without changing anything.
pub fn plan(imported: &BackupData, current: &Library) -> ImportPlan {
    let existing: HashSet<&str> = current.prompts.iter().map(|p| p.id.as_str()).collect();
    let distinct: HashSet<&str> = imported.prompts.iter().map(|p| p.id.as_str()).collect();
    let updated = distinct.iter().filter(|id| existing.contains(*id)).count();
    ImportPlan {
        prompt_count: imported.prompts.len(),
        new_prompts: distinct.len() - updated,
        updated_prompts: updated,
        structure_count: imported.structures.len(),
    }
}

/// The library becomes exactly the import, except that structures survive an
/// import that has none.
pub fn replace(imported: &BackupData, current: &Library) -> Library {
    let structures = if imported.structures.is_empty() {
        current.structures.clone()
    } else {
        upsert_by_id(&[], &imported.structures, |s: &Structure| s.id.as_str())
    };
    Library {
        prompts: upsert_by_id(&[], &normalized_prompts(imported), |p: &Prompt| p.id.as_str()),
        categories: anchor_categories(imported.categories.iter()),
        tags: ordered_union(&[], &imported.tags),
        structures,
    }
}

/// Upsert-merges the import into the current library.
///
/// Current prompts keep their positions (overwritten in place on id
/// collision); prompts new to the library follow in import order. Merging the
/// same import twice yields the same library as merging it once.
pub fn merge(imported: &BackupData, current: &Library) -> Library {
    let structures = if imported.structures.is_empty() {
        current.structures.clone()
    } else {
        upsert_by_id(&current.structures, &imported.structures, |s: &Structure| s.id.as_str())
    };
    Library {
        prompts: upsert_by_id(&current.prompts, &normalized_prompts(imported), |p: &Prompt| p.id.as_str()),
        categories: anchor_categories(current.categories.iter().chain(imported.categories.iter())),
        tags: ordered_union(&current.tags, &imported.tags),
        structures,
    }
}

/// Applies an import under `policy`, refusing imports without prompts.
pub fn apply_import(policy: ImportPolicy, imported: &BackupData, current: &Library) -> Result<Library, SyncError> {
    if imported.prompts.is_empty() {
        return Err(SyncError::ImportInvalid("file contains no prompts".to_string()));
    }
    Ok(match policy {
        ImportPolicy::Replace => replace(imported, current),
        ImportPolicy::Merge => merge(imported, current),
    })
}

/// Parses an exported JSON document into a snapshot.
pub fn parse_backup_json(bytes: &[u8]) -> Result<BackupData, SyncError> {
    serde_json::from_slice::<BackupData>(bytes).map_err(|e| SyncError::ImportInvalid(e.to_string()))
}

/// Imported prompts with their tag lists trimmed and de-duplicated.
fn normalized_prompts(imported: &BackupData) -> Vec<Prompt> {
    imported
        .prompts
        .iter()
        .cloned()
        .map(|mut p| {
            p.normalize_tags();
            p
        })
        .collect()
}

/// One entry per distinct key; `incoming` overwrites `base` in place and new
/// keys are appended in first-seen order. Later duplicates inside `incoming`
/// win as well.
fn upsert_by_id<T, F>(base: &[T], incoming: &[T], key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut out: Vec<T> = Vec::with_capacity(base.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(out.capacity());

    for item in base.iter().chain(incoming.iter()) {
        let k = key(item);
        match index.get(k) {
            Some(&pos) => out[pos] = item.clone(),
            None => {
                index.insert(k.to_string(), out.len());
                out.push(item.clone());
            }
        }
    }
    out
}

/// Sentinel first, then every other distinct non-empty name in first-seen order.
fn anchor_categories<'a, I>(names: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    let mut out = vec![ALL_CATEGORY.to_string()];
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(ALL_CATEGORY);
    for name in names {
        let trimmed = name.trim();
        if !trimmed.is_empty() && seen.insert(trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn ordered_union(base: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(base.len() + incoming.len());
    for tag in base.iter().chain(incoming.iter()) {
        let trimmed = tag.trim();
        if !trimmed.is_empty() && seen.insert(trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}
