// crates/cutline-core/src/diff.rs
//
// JSON-diff application — the host's authoritative mutation stream.
//
// The host pushes an array of `{ type, key, value }` actions where `key`
// is a path of property names and `{ "id": … }` array selectors. Actions
// are applied to the serialized project tree, then the tree is
// deserialized back into the typed replica. Engine-transient state (the
// version counter, selection anchor, live resize previews) is carried
// across the round-trip by id, since the host knows nothing about it.
//
// Unknown paths are no-ops with a debug log; only structurally malformed
// actions are errors. A failed re-deserialize leaves the replica untouched
// — the host remains the source of truth and will resend.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::keyframes::KeyframePreview;
use crate::project::Project;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("diff actions must be an array, got {0}")]
    NotAnArray(&'static str),
    #[error("malformed diff action: {0}")]
    Malformed(String),
    #[error("project replica failed to reserialize: {0}")]
    Reserialize(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActionKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
enum KeySegment {
    Key(String),
    Id(String),
}

struct Action {
    kind: ActionKind,
    key: Vec<KeySegment>,
    value: Value,
}

fn parse_action(raw: &Value) -> Result<Action, DiffError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| DiffError::Malformed(format!("action is not an object: {raw}")))?;
    let kind = match obj.get("type").and_then(Value::as_str) {
        Some("insert") => ActionKind::Insert,
        Some("update") => ActionKind::Update,
        Some("delete") => ActionKind::Delete,
        other => {
            return Err(DiffError::Malformed(format!("unknown action type {other:?}")));
        }
    };
    let raw_key = obj
        .get("key")
        .and_then(Value::as_array)
        .ok_or_else(|| DiffError::Malformed("action without key array".into()))?;
    let mut key = Vec::with_capacity(raw_key.len());
    for seg in raw_key {
        match seg {
            Value::String(s) => key.push(KeySegment::Key(s.clone())),
            Value::Object(o) => {
                let id = o
                    .get("id")
                    .ok_or_else(|| DiffError::Malformed(format!("selector without id: {seg}")))?;
                key.push(KeySegment::Id(id_to_string(id)));
            }
            other => {
                return Err(DiffError::Malformed(format!("bad key segment: {other}")));
            }
        }
    }
    if key.is_empty() {
        return Err(DiffError::Malformed("empty key path".into()));
    }
    Ok(Action { kind, key, value: obj.get("value").cloned().unwrap_or(Value::Null) })
}

/// Host ids are strings, but old hosts send numeric layer ids — compare
/// them through their canonical string form.
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn descend<'a>(node: &'a mut Value, segment: &KeySegment) -> Option<&'a mut Value> {
    match segment {
        KeySegment::Key(k) => node.get_mut(k.as_str()),
        KeySegment::Id(id) => node.as_array_mut()?.iter_mut().find(|e| {
            e.get("id").map(|v| id_to_string(v) == *id).unwrap_or(false)
        }),
    }
}

fn walk<'a>(root: &'a mut Value, path: &[KeySegment]) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in path {
        node = descend(node, segment)?;
    }
    Some(node)
}

fn merge_objects(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (k, v) in incoming {
        target.insert(k.clone(), v.clone());
    }
}

/// Apply one action to the serialized tree. Returns false on unknown paths.
fn apply_action(root: &mut Value, action: &Action) -> bool {
    let (parent_path, last) = action.key.split_at(action.key.len() - 1);
    let last = &last[0];

    match action.kind {
        ActionKind::Insert => {
            // Append when the target resolves to an array; otherwise the
            // value replaces the parent's slot.
            if let Some(target) = walk(root, &action.key) {
                if let Value::Array(items) = target {
                    items.push(action.value.clone());
                    return true;
                }
            }
            let Some(parent) = walk(root, parent_path) else { return false };
            match (parent, last) {
                (Value::Object(obj), KeySegment::Key(k)) => {
                    obj.insert(k.clone(), action.value.clone());
                    true
                }
                (Value::Array(items), KeySegment::Id(id)) => {
                    // Re-insert of an entity that already has an id slot:
                    // replace in place, append when it is genuinely new.
                    match items
                        .iter_mut()
                        .find(|e| e.get("id").map(|v| id_to_string(v) == *id).unwrap_or(false))
                    {
                        Some(slot) => *slot = action.value.clone(),
                        None => items.push(action.value.clone()),
                    }
                    true
                }
                _ => false,
            }
        }
        ActionKind::Update => {
            let Some(target) = walk(root, &action.key) else { return false };
            match (&mut *target, &action.value) {
                (Value::Object(t), Value::Object(v)) => {
                    merge_objects(t, v);
                    true
                }
                (slot, value) => {
                    *slot = value.clone();
                    true
                }
            }
        }
        ActionKind::Delete => {
            let Some(parent) = walk(root, parent_path) else { return false };
            match (parent, last) {
                (Value::Object(obj), KeySegment::Key(k)) => obj.remove(k.as_str()).is_some(),
                (Value::Array(items), KeySegment::Id(id)) => {
                    let before = items.len();
                    items.retain(|e| {
                        e.get("id").map(|v| id_to_string(v) != *id).unwrap_or(true)
                    });
                    items.len() != before
                }
                _ => false,
            }
        }
    }
}

/// Carry engine-transient state across the serde round-trip.
fn preserve_transients(old: &Project, new: &mut Project) {
    new.version = old.version;
    new.last_selected = old.last_selected.clone();

    let previews: Vec<(&str, &KeyframePreview)> = old
        .clips
        .iter()
        .filter_map(|c| c.ui.keyframe_preview.as_ref().map(|p| (c.id.as_str(), p)))
        .collect();
    for (id, preview) in previews {
        if let Some(clip) = new.clip_mut(id) {
            clip.ui.keyframe_preview = Some(preview.clone());
        }
    }
    let tr_previews: Vec<(&str, &KeyframePreview)> = old
        .transitions
        .iter()
        .filter_map(|t| t.ui.keyframe_preview.as_ref().map(|p| (t.id.as_str(), p)))
        .collect();
    for (id, preview) in tr_previews {
        if let Some(tr) = new.transition_mut(id) {
            tr.ui.keyframe_preview = Some(preview.clone());
        }
    }
}

/// Apply a host diff to the replica. Returns how many actions touched the
/// tree. After application, clips/transitions/layers are re-sorted and the
/// layer `y` index rebuilt, so the next frame renders the new order.
pub fn apply_json_diff(project: &mut Project, actions: &Value) -> Result<usize, DiffError> {
    let list = actions
        .as_array()
        .ok_or(DiffError::NotAnArray("diff root"))?;

    let mut root = serde_json::to_value(&*project)?;
    let mut applied = 0;
    for raw in list {
        let action = parse_action(raw)?;
        if apply_action(&mut root, &action) {
            applied += 1;
        } else {
            log::debug!("[diff] path not found, skipping: {raw}");
        }
    }

    if applied > 0 {
        let mut next: Project = serde_json::from_value(root)?;
        preserve_transients(project, &mut next);
        next.normalize();
        next.bump_version();
        *project = next;
    }
    Ok(applied)
}

/// Full project replacement — the host's `loadJson`. Transient engine state
/// does not survive a load; a fresh project starts clean.
pub fn load_project(value: Value) -> Result<Project, DiffError> {
    let mut project: Project = serde_json::from_value(value)?;
    project.normalize();
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::test_fixtures::*;
    use serde_json::json;

    fn project_with_clip() -> Project {
        let mut p = base_project();
        p.clips.push(clip_at("c1", 1, 2.0, 0.0, 4.0));
        p
    }

    #[test]
    fn insert_appends_to_entity_arrays_and_resorts() {
        let mut p = project_with_clip();
        let clip_json = serde_json::to_value(clip_at("c0", 1, 0.5, 0.0, 1.0)).unwrap();
        let n = apply_json_diff(
            &mut p,
            &json!([{ "type": "insert", "key": ["clips"], "value": clip_json }]),
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(p.clips.len(), 2);
        // Re-sorted by position: the inserted clip comes first.
        assert_eq!(p.clips[0].id, "c0");
    }

    #[test]
    fn update_merges_partial_entity_objects() {
        let mut p = project_with_clip();
        apply_json_diff(
            &mut p,
            &json!([{
                "type": "update",
                "key": ["clips", { "id": "c1" }],
                "value": { "position": 9.0 }
            }]),
        )
        .unwrap();
        let clip = p.clip("c1").unwrap();
        assert_eq!(clip.position, 9.0);
        assert_eq!(clip.end, 4.0, "unmentioned fields survive the merge");
    }

    #[test]
    fn update_replaces_scalar_slots() {
        let mut p = project_with_clip();
        apply_json_diff(
            &mut p,
            &json!([{
                "type": "update",
                "key": ["clips", { "id": "c1" }, "position"],
                "value": 6.5
            }]),
        )
        .unwrap();
        assert_eq!(p.clip("c1").unwrap().position, 6.5);
    }

    #[test]
    fn delete_then_reinsert_restores_the_project() {
        let mut p = project_with_clip();
        let before = p.clone();
        let clip_json = serde_json::to_value(p.clip("c1").unwrap()).unwrap();

        apply_json_diff(
            &mut p,
            &json!([{ "type": "delete", "key": ["clips", { "id": "c1" }], "value": null }]),
        )
        .unwrap();
        assert!(p.clip("c1").is_none());

        apply_json_diff(
            &mut p,
            &json!([{ "type": "insert", "key": ["clips"], "value": clip_json }]),
        )
        .unwrap();
        // Version differs (engine-local), everything the host owns is back.
        let mut restored = p.clone();
        restored.version = before.version;
        assert_eq!(restored, before);
    }

    #[test]
    fn unknown_ids_are_skipped_not_errors() {
        let mut p = project_with_clip();
        let n = apply_json_diff(
            &mut p,
            &json!([{
                "type": "update",
                "key": ["clips", { "id": "ghost" }, "position"],
                "value": 1.0
            }]),
        )
        .unwrap();
        assert_eq!(n, 0);
        assert_eq!(p.clip("c1").unwrap().position, 2.0);
    }

    #[test]
    fn malformed_actions_error_without_mutating() {
        let mut p = project_with_clip();
        let before = p.clone();
        let err = apply_json_diff(&mut p, &json!([{ "type": "explode", "key": ["clips"] }]));
        assert!(matches!(err, Err(DiffError::Malformed(_))));
        assert_eq!(p, before);
    }

    #[test]
    fn layer_insert_rebuilds_the_y_index() {
        let mut p = project_with_clip();
        let layer_json = serde_json::to_value(crate::project::Layer::new(9)).unwrap();
        apply_json_diff(
            &mut p,
            &json!([{ "type": "insert", "key": ["layers"], "value": layer_json }]),
        )
        .unwrap();
        // Layer 9 renders above everything: y = 0, and the old top shifts.
        assert_eq!(p.layer(9).unwrap().y, 0.0);
        assert_eq!(p.layer(5).unwrap().y, p.layer(9).unwrap().height);
    }

    #[test]
    fn playhead_update_via_scalar_path() {
        let mut p = project_with_clip();
        apply_json_diff(
            &mut p,
            &json!([{ "type": "update", "key": ["playhead_position"], "value": 12.5 }]),
        )
        .unwrap();
        assert_eq!(p.playhead_position, 12.5);
    }

    #[test]
    fn load_replaces_and_normalizes() {
        let mut donor = base_project();
        donor.clips.push(clip_at("z", 1, 5.0, 0.0, 1.0));
        donor.clips.push(clip_at("a", 1, 1.0, 0.0, 1.0));
        let mut value = serde_json::to_value(&donor).unwrap();
        // Scramble layer y values; load must rebuild them.
        value["layers"][0]["y"] = json!(999.0);
        let loaded = load_project(value).unwrap();
        assert_eq!(loaded.clips[0].id, "a");
        assert_eq!(loaded.layer(5).unwrap().y, 0.0);
    }
}
