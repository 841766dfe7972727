// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Computes the minimal leaf-path `update_set` between a handler's proposed
//! document and the document currently persisted.

use serde_json::{Map, Value};

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn diff_into(prefix: &str, proposal: &Value, current: &Value, out: &mut Map<String, Value>) {
    match proposal {
        Value::Object(fields) => {
            for (field, value) in fields {
                if field == "_version" {
                    continue;
                }
                let path = if prefix.is_empty() { field.clone() } else { format!("{prefix}.{field}") };
                let current_value = current.get(field).unwrap_or(&Value::Null);
                diff_into(&path, value, current_value, out);
            }
        }
        // Arrays are always written whole from the proposal, never merged.
        Value::Array(_) => {
            if !is_empty(proposal) && proposal != current {
                out.insert(prefix.to_string(), proposal.clone());
            }
        }
        scalar => {
            if !is_empty(scalar) && scalar != current {
                out.insert(prefix.to_string(), scalar.clone());
            }
        }
    }
}

/// `proposal` and `current` are full documents (typically
/// `ArtifactModel`s serialized to `Value`). Returns the dotted-path object
/// to pass as `casUpdate`'s `set_ops`; empty means no write is needed.
pub fn compute_update_set(proposal: &Value, current: &Value) -> Value {
    let mut out = Map::new();
    diff_into("", proposal, current, &mut out);
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_unchanged_scalars_and_empty_values() {
        let proposal = json!({"aid": "1", "version": 1, "payload": {"nvr": "", "issuer": "alice"}});
        let current = json!({"aid": "1", "version": 1, "payload": {"nvr": "old-1.0", "issuer": "alice"}});
        let set = compute_update_set(&proposal, &current);
        assert_eq!(set, json!({}));
    }

    #[test]
    fn writes_a_changed_nested_scalar_by_dotted_path() {
        let proposal = json!({"payload": {"issuer": "bob"}});
        let current = json!({"payload": {"issuer": "alice"}});
        let set = compute_update_set(&proposal, &current);
        assert_eq!(set, json!({"payload.issuer": "bob"}));
    }

    #[test]
    fn writes_changed_arrays_whole_never_merged() {
        let proposal = json!({"states": [{"a": 1}, {"a": 2}]});
        let current = json!({"states": [{"a": 1}]});
        let set = compute_update_set(&proposal, &current);
        assert_eq!(set, json!({"states": [{"a": 1}, {"a": 2}]}));
    }

    #[test]
    fn drops_the_version_field_entirely() {
        let proposal = json!({"_version": 7, "aid": "1"});
        let current = json!({"_version": 3, "aid": "1"});
        let set = compute_update_set(&proposal, &current);
        assert_eq!(set, json!({}));
    }

    #[test]
    fn introduces_a_new_nested_object_not_present_in_current() {
        let proposal = json!({"payload": {"nvr": "x-1-1"}});
        let current = json!({});
        let set = compute_update_set(&proposal, &current);
        assert_eq!(set, json!({"payload.nvr": "x-1-1"}));
    }
}
