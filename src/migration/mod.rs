// src/migration/mod.rs
// MigrationEngine (spec 4.10): upgrades a persisted JSON document to the
// current schema on load. Operates on raw `serde_json::Value` so it can see
// and remove legacy keys the current `ProjectState` struct no longer
// declares.

use serde_json::{Map, Value};
use tracing::info;

/// Bumped whenever a migration step below is added.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Runs every migration step in order and stamps the result with
/// `CURRENT_SCHEMA_VERSION`. Idempotent: `migrate(migrate(s)) == migrate(s)`
/// (spec 8, testable property 6) because every step below is itself
/// idempotent and the version stamp short-circuits nothing (there is
/// currently one version; a future version bump would gate steps on the
/// document's existing `schema_version`).
pub fn migrate(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        rename_legacy_file_keys(obj);
        dedup_and_trim_conversations(obj);
        remove_legacy_inference_api_keys(obj);
        collapse_legacy_template_details(obj);
        ensure_project_name(obj);
        ensure_project_updates_accumulator(obj);
        obj.insert(
            "schema_version".to_string(),
            Value::Number(CURRENT_SCHEMA_VERSION.into()),
        );
    }
    doc
}

/// Returns `None` if the document is already current (no step changed
/// anything observable) — mirrors the source's "migrate returns null if no
/// migration needed" contract for callers that want to skip a redundant
/// write. `Store::load` does not use this fast path today (it always
/// persists once on load) but the function is kept for callers that do.
pub fn migrate_if_needed(doc: Value) -> Option<Value> {
    let before = doc.clone();
    let after = migrate(doc);
    if before == after { None } else { Some(after) }
}

fn rename_legacy_file_keys(obj: &mut Map<String, Value>) {
    if let Some(Value::Object(files)) = obj.get_mut("generated_files_map").or(obj.get_mut("generatedFilesMap")) {
        for file in files.values_mut() {
            if let Some(file_obj) = file.as_object_mut() {
                move_key(file_obj, "file_path", "path");
                move_key(file_obj, "file_contents", "contents");
                move_key(file_obj, "file_purpose", "purpose");
            }
        }
    }
}

fn move_key(obj: &mut Map<String, Value>, legacy: &str, current: &str) {
    if !obj.contains_key(current) {
        if let Some(v) = obj.remove(legacy) {
            obj.insert(current.to_string(), v);
        }
    } else {
        obj.remove(legacy);
    }
}

/// Dedups `conversation_messages` by `conversationId` (last write wins) and,
/// if the list exceeds 25 entries, drops any whose text contains the
/// `<Internal Memo>` sentinel.
fn dedup_and_trim_conversations(obj: &mut Map<String, Value>) {
    let Some(Value::Array(messages)) = obj.get_mut("conversation_messages") else {
        return;
    };

    let mut by_id: Vec<(String, Value)> = Vec::new();
    for msg in messages.drain(..) {
        let id = msg
            .get("conversationId")
            .or_else(|| msg.get("conversation_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(existing) = by_id.iter_mut().find(|(k, _)| *k == id) {
            existing.1 = msg;
        } else {
            by_id.push((id, msg));
        }
    }

    let mut deduped: Vec<Value> = by_id.into_iter().map(|(_, v)| v).collect();
    if deduped.len() > 25 {
        deduped.retain(|m| {
            let text = m.get("content").and_then(Value::as_str).unwrap_or("");
            !text.contains("<Internal Memo>")
        });
    }

    *messages = deduped;
}

fn remove_legacy_inference_api_keys(obj: &mut Map<String, Value>) {
    if let Some(Value::Object(ctx)) = obj.get_mut("inference_context") {
        ctx.remove("userApiKeys");
        ctx.remove("user_api_keys");
    }
}

/// Legacy documents stored a full `templateDetails` blob inline; current
/// documents store only `template_name` and reconstruct details lazily.
fn collapse_legacy_template_details(obj: &mut Map<String, Value>) {
    if obj.contains_key("template_name") {
        return;
    }
    if let Some(details) = obj.remove("templateDetails").or_else(|| obj.remove("template_details")) {
        if let Some(name) = details.get("templateName").or_else(|| details.get("name")) {
            obj.insert("template_name".to_string(), name.clone());
        }
    }
    obj.entry("template_name").or_insert(Value::String(String::new()));
}

fn ensure_project_name(obj: &mut Map<String, Value>) {
    let has_name = matches!(obj.get("project_name"), Some(Value::String(s)) if !s.is_empty());
    if has_name {
        return;
    }
    let fallback = obj
        .get("blueprint")
        .and_then(|b| b.get("projectName").or_else(|| b.get("project_name")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| obj.get("template_name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "project".to_string());

    let suffix = nanoid_like();
    let mut generated = format!("{fallback}-{suffix}");
    generated.truncate(20);
    info!(generated_name = %generated, "migration: generated missing projectName");
    obj.insert("project_name".to_string(), Value::String(generated));
}

fn ensure_project_updates_accumulator(obj: &mut Map<String, Value>) {
    if !matches!(obj.get("project_updates_accumulator"), Some(Value::Array(_))) {
        obj.insert("project_updates_accumulator".to_string(), Value::Array(vec![]));
    }
}

/// Deterministic, migration-time-only id generator (not used for anything
/// security sensitive). Avoids pulling in `nanoid` for one call site.
fn nanoid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renames_legacy_file_keys() {
        let doc = json!({
            "generated_files_map": {
                "a.ts": {"file_path": "a.ts", "file_contents": "x", "file_purpose": "p"}
            }
        });
        let migrated = migrate(doc);
        let file = &migrated["generated_files_map"]["a.ts"];
        assert_eq!(file["path"], "a.ts");
        assert_eq!(file["contents"], "x");
        assert_eq!(file["purpose"], "p");
    }

    #[test]
    fn dedups_conversation_by_id_last_write_wins() {
        let doc = json!({
            "conversation_messages": [
                {"conversationId": "1", "content": "first"},
                {"conversationId": "1", "content": "second"},
            ]
        });
        let migrated = migrate(doc);
        let messages = migrated["conversation_messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "second");
    }

    #[test]
    fn migration_is_a_fixed_point() {
        let doc = json!({"generated_files_map": {}, "conversation_messages": []});
        let once = migrate(doc);
        let twice = migrate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn generates_missing_project_name_capped_to_20_chars() {
        let doc = json!({"blueprint": {"projectName": "a-very-long-project-title-indeed"}});
        let migrated = migrate(doc);
        let name = migrated["project_name"].as_str().unwrap();
        assert!(name.len() <= 20);
    }
}
