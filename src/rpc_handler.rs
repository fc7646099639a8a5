//! RPC method handler for the Promptbook JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be tested without stdio.
//! `handle_method` dispatches a method call to the library manager, the
//! import engine, the sync reconciler or the settings engine.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::app::App;
use crate::managers::library_manager::{assemble_content, LibraryManagerTrait};
use crate::services::import_merge::{self, ImportPolicy};
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::prompt::{ComponentTarget, Prompt, PromptComponent, Structure};
use crate::types::sync::ConflictChoice;

fn param_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn param_usize(params: &Value, key: &str) -> Result<usize, String> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| format!("missing {}", key))
}

fn param_as<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, String> {
    let raw = params.get(key).cloned().ok_or_else(|| format!("missing {}", key))?;
    serde_json::from_value(raw).map_err(|e| format!("invalid {}: {}", key, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Runs a library mutation, then persists and signals autosave.
fn mutate<R>(
    app: &App,
    f: impl FnOnce(&mut crate::managers::library_manager::LibraryManager) -> Result<R, String>,
) -> Result<R, String> {
    let mut manager = app.library();
    let out = f(&mut manager)?;
    app.record_change(&manager).map_err(|e| e.to_string())?;
    Ok(out)
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Library ───
        "library.get" => to_json(app.library().library()),
        "prompt.list" => {
            let category = params.get("category").and_then(|v| v.as_str());
            let manager = app.library();
            to_json(&manager.list_prompts(category))
        }
        "prompt.save" => {
            let prompt: Prompt = param_as(params, "prompt")?;
            let id = mutate(app, |m| {
                if !prompt.id.is_empty() && m.get_prompt(&prompt.id).is_some() {
                    let id = prompt.id.clone();
                    m.update_prompt(prompt).map_err(|e| e.to_string())?;
                    Ok(id)
                } else {
                    m.create_prompt(prompt).map_err(|e| e.to_string())
                }
            })?;
            Ok(json!({"id": id}))
        }
        "prompt.delete" => {
            let id = param_str(params, "id")?;
            mutate(app, |m| m.delete_prompt(id).map_err(|e| e.to_string()))?;
            Ok(json!({"ok": true}))
        }
        "prompt.move" => {
            let from = param_usize(params, "from")?;
            let to = param_usize(params, "to")?;
            mutate(app, |m| m.move_prompt(from, to).map_err(|e| e.to_string()))?;
            Ok(json!({"ok": true}))
        }
        "category.add" => {
            let name = param_str(params, "name")?;
            let added = mutate(app, |m| m.add_category(name).map_err(|e| e.to_string()))?;
            Ok(json!({"added": added}))
        }
        "category.remove" => {
            let name = param_str(params, "name")?;
            let removed = mutate(app, |m| m.remove_category(name).map_err(|e| e.to_string()))?;
            Ok(json!({"removed": removed}))
        }
        "category.move" => {
            let from = param_usize(params, "from")?;
            let to = param_usize(params, "to")?;
            mutate(app, |m| m.move_category(from, to).map_err(|e| e.to_string()))?;
            Ok(json!({"ok": true}))
        }
        "tag.add" => {
            let tag = param_str(params, "tag")?;
            let added = mutate(app, |m| m.add_tag(tag).map_err(|e| e.to_string()))?;
            Ok(json!({"added": added}))
        }
        "tag.remove" => {
            let tag = param_str(params, "tag")?;
            let removed = mutate(app, |m| Ok(m.remove_tag(tag)))?;
            Ok(json!({"removed": removed}))
        }

        // ─── Structures ───
        "structure.save" => {
            let structure: Structure = param_as(params, "structure")?;
            mutate(app, |m| m.save_structure(structure).map_err(|e| e.to_string()))?;
            Ok(json!({"ok": true}))
        }
        "structure.delete" => {
            let id = param_str(params, "id")?;
            mutate(app, |m| m.delete_structure(id).map_err(|e| e.to_string()))?;
            Ok(json!({"ok": true}))
        }
        "structure.scaffold" => {
            let structure_id = param_str(params, "structure_id")?;
            let existing: Vec<PromptComponent> = match params.get("components") {
                Some(_) => param_as(params, "components")?,
                None => Vec::new(),
            };
            let components = app
                .library()
                .scaffold_components(structure_id, &existing)
                .map_err(|e| e.to_string())?;
            to_json(&components)
        }
        "prompt.assemble" => {
            let components: Vec<PromptComponent> = param_as(params, "components")?;
            let target: ComponentTarget = match params.get("target") {
                Some(_) => param_as(params, "target")?,
                None => ComponentTarget::System,
            };
            Ok(json!({"content": assemble_content(&components, target)}))
        }

        // ─── Import / export ───
        "import.plan" => {
            let imported = import_merge::parse_backup_json(param_str(params, "json")?.as_bytes())
                .map_err(|e| e.to_string())?;
            let plan = import_merge::plan(&imported, app.library().library());
            to_json(&plan)
        }
        "import.apply" => {
            let imported = import_merge::parse_backup_json(param_str(params, "json")?.as_bytes())
                .map_err(|e| e.to_string())?;
            let policy: ImportPolicy = param_as(params, "policy")?;
            let count = mutate(app, |m| {
                let next = import_merge::apply_import(policy, &imported, m.library())
                    .map_err(|e| e.to_string())?;
                m.replace_library(next);
                Ok(m.library().prompts.len())
            })?;
            Ok(json!({"prompt_count": count}))
        }
        "export.backup" => {
            let snapshot = app.snapshot();
            let filename = format!("prompt_book_backup_{}.json", Utc::now().format("%Y-%m-%d"));
            Ok(json!({"filename": filename, "data": to_json(&snapshot)?}))
        }

        // ─── Sync ───
        "sync.status" => to_json(&app.sync.status()),
        "sync.connect" => {
            let code = param_str(params, "code")?;
            let state = app.sync.connect(code).await.map_err(|e| e.to_string())?;
            to_json(&state)
        }
        "sync.check" => to_json(&app.sync.start().await),
        "sync.resolve" => {
            let choice: ConflictChoice = param_as(params, "choice")?;
            if let Some(data) = app.sync.resolve(choice).await.map_err(|e| e.to_string())? {
                app.apply_remote(&data).map_err(|e| e.to_string())?;
            }
            to_json(&app.sync.state())
        }
        "sync.upload" => {
            let snapshot = app.snapshot();
            let modified = app.sync.upload_now(&snapshot).await.map_err(|e| e.to_string())?;
            Ok(json!({"modified_time": modified}))
        }
        "sync.download" => {
            let remote = app.sync.download_now().await.map_err(|e| e.to_string())?;
            let summary = json!({
                "last_updated": remote.data.last_updated,
                "modified_time": remote.modified_time,
                "prompt_count": remote.data.prompts.len(),
            });
            app.stage_restore(remote);
            Ok(summary)
        }
        "sync.restore" => {
            let remote = app
                .take_staged_restore()
                .ok_or("no downloaded backup to restore")?;
            app.apply_remote(&remote.data).map_err(|e| e.to_string())?;
            app.sync.confirm_restore(&remote);
            Ok(json!({"prompt_count": remote.data.prompts.len()}))
        }
        "sync.sign_out" => {
            app.take_staged_restore();
            app.sync.sign_out().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => to_json(app.settings().get_settings()),
        "settings.set" => {
            let key = param_str(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            app.settings().set_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
