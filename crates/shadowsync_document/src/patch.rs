//! Merge patches with null-leaf deletion semantics.
//!
//! A patch is a JSON value applied onto a base document: objects merge
//! recursively, a `null` leaf removes the key it addresses, and any other
//! value replaces what the base held. `diff` produces the inverse: the
//! smallest patch that turns one document into another.

use serde_json::{Map, Value};

/// Applies `patch` onto `target` in place.
///
/// A `null` value in the patch removes the corresponding key from the
/// target. Nested objects merge recursively. A non-object patch replaces
/// the target wholesale.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(entries) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let fields = target.as_object_mut().expect("target coerced to object");
            for (key, value) in entries {
                if value.is_null() {
                    fields.remove(key);
                } else if value.is_object() {
                    let slot = fields.entry(key.clone()).or_insert(Value::Object(Map::new()));
                    merge_patch(slot, value);
                } else {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        other => *target = other.clone(),
    }
}

/// Computes the patch that transforms `base` into `target`.
///
/// Keys present only in `target` (or with differing values) appear with the
/// target value; keys removed from `base` appear as `null`, so that
/// `merge_patch(base, diff(base, target)) == target` for object documents.
pub fn diff(base: &Value, target: &Value) -> Value {
    match (base, target) {
        (Value::Object(base_fields), Value::Object(target_fields)) => {
            let mut patch = Map::new();
            for (key, target_value) in target_fields {
                match base_fields.get(key) {
                    Some(base_value) if base_value == target_value => {}
                    Some(base_value) if base_value.is_object() && target_value.is_object() => {
                        let nested = diff(base_value, target_value);
                        if nested.as_object().is_some_and(|m| !m.is_empty()) {
                            patch.insert(key.clone(), nested);
                        }
                    }
                    _ => {
                        patch.insert(key.clone(), target_value.clone());
                    }
                }
            }
            for key in base_fields.keys() {
                if !target_fields.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => target.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_leaves() {
        let mut doc = json!({"state": {"reported": {"x": 1}}});
        merge_patch(&mut doc, &json!({"state": {"reported": {"x": 2}}}));
        assert_eq!(doc, json!({"state": {"reported": {"x": 2}}}));
    }

    #[test]
    fn merge_adds_missing_keys() {
        let mut doc = json!({"state": {"reported": {"x": 1}}});
        merge_patch(&mut doc, &json!({"state": {"desired": {"y": "on"}}}));
        assert_eq!(
            doc,
            json!({"state": {"reported": {"x": 1}, "desired": {"y": "on"}}})
        );
    }

    #[test]
    fn null_leaf_removes_key() {
        let mut doc = json!({"state": {"reported": {"x": 1, "y": 2}}});
        merge_patch(&mut doc, &json!({"state": {"reported": {"y": null}}}));
        assert_eq!(doc, json!({"state": {"reported": {"x": 1}}}));
    }

    #[test]
    fn null_removes_whole_subtree() {
        let mut doc = json!({"state": {"reported": {"x": 1}, "desired": {"y": 2}}});
        merge_patch(&mut doc, &json!({"state": {"desired": null}}));
        assert_eq!(doc, json!({"state": {"reported": {"x": 1}}}));
    }

    #[test]
    fn scalar_patch_replaces_object() {
        let mut doc = json!({"state": {"reported": {"x": 1}}});
        merge_patch(&mut doc, &json!({"state": {"reported": 7}}));
        assert_eq!(doc, json!({"state": {"reported": 7}}));
    }

    #[test]
    fn diff_of_identical_documents_is_empty() {
        let doc = json!({"state": {"reported": {"x": 1}}});
        assert_eq!(diff(&doc, &doc), json!({}));
    }

    #[test]
    fn diff_reports_changed_leaves_only() {
        let base = json!({"state": {"reported": {"x": 1, "y": 2}}});
        let target = json!({"state": {"reported": {"x": 5, "y": 2}}});
        assert_eq!(diff(&base, &target), json!({"state": {"reported": {"x": 5}}}));
    }

    #[test]
    fn diff_marks_removed_keys_with_null() {
        let base = json!({"state": {"reported": {"x": 1, "y": 2}}});
        let target = json!({"state": {"reported": {"x": 1}}});
        assert_eq!(
            diff(&base, &target),
            json!({"state": {"reported": {"y": null}}})
        );
    }

    #[test]
    fn diff_then_merge_restores_target() {
        let base = json!({"state": {"reported": {"x": 1, "y": 2}, "desired": {"z": 3}}});
        let target = json!({"state": {"reported": {"x": 9}, "desired": {"z": 3, "w": true}}});

        let patch = diff(&base, &target);
        let mut merged = base.clone();
        merge_patch(&mut merged, &patch);
        assert_eq!(merged, target);
    }

    #[test]
    fn local_edits_win_when_applied_last() {
        // Three-way shape: both sides diverged from the base; the local
        // patch applied atop the remote document keeps remote additions but
        // takes the local value for the contested leaf.
        let base = json!({"state": {"reported": {"x": 1}}});
        let local = json!({"state": {"reported": {"x": 2}}});
        let remote = json!({"state": {"reported": {"x": 9, "y": "a"}}});

        let local_patch = diff(&base, &local);
        let mut merged = remote.clone();
        merge_patch(&mut merged, &local_patch);
        assert_eq!(merged, json!({"state": {"reported": {"x": 2, "y": "a"}}}));
    }
}
