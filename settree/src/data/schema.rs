//! JSON Schema resolution utilities.
//!
//! The resolver walks a [`Path`] through the schema in parallel with the
//! document. Before every step the current node is normalized:
//!
//! - `$ref` pointers (`#/$defs/...`, `#/definitions/...`) are followed,
//! - nullable wrappers (`anyOf: [X, {type: null}]`, as emitted for `Option<T>`)
//!   collapse to `X`,
//! - `allOf` branches are merged into one schema.

use serde_json::{Map, Value};

use crate::{
    data::directives::{self, StringSubType},
    error::{Error, Result},
    path::{Path, Segment},
};

/// Guard against `$ref` loops and pathological nesting.
const MAX_NORMALIZE_STEPS: usize = 64;

/// Merge `allOf` branches into a single schema.
///
/// Properties are unioned (later branches win per key), `required` arrays are
/// concatenated, every other key is overwritten by later branches. Schemas
/// without `allOf` are returned unchanged.
pub fn merge_all_of(schema: &Value) -> Value {
    let Some(branches) = schema.get("allOf").and_then(Value::as_array) else {
        return schema.clone();
    };
    let Some(base) = schema.as_object() else {
        return schema.clone();
    };

    let mut merged = base.clone();
    merged.remove("allOf");
    let mut properties = merged
        .remove("properties")
        .and_then(|p| p.as_object().cloned())
        .unwrap_or_default();
    let mut required = take_required(&mut merged);

    for branch in branches {
        let branch = merge_all_of(branch);
        let Some(obj) = branch.as_object() else {
            continue;
        };
        for (k, v) in obj {
            match k.as_str() {
                "properties" => {
                    if let Some(props) = v.as_object() {
                        for (name, prop) in props {
                            properties.insert(name.clone(), prop.clone());
                        }
                    }
                }
                "required" => {
                    if let Some(items) = v.as_array() {
                        required.extend(items.iter().filter_map(Value::as_str).map(String::from));
                    }
                }
                _ => {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
    }

    if !properties.is_empty() {
        merged.insert("properties".into(), Value::Object(properties));
    }
    if !required.is_empty() {
        let mut seen = Vec::<String>::new();
        for r in required {
            if !seen.contains(&r) {
                seen.push(r);
            }
        }
        merged.insert(
            "required".into(),
            Value::Array(seen.into_iter().map(Value::String).collect()),
        );
    }
    Value::Object(merged)
}

fn take_required(obj: &mut Map<String, Value>) -> Vec<String> {
    obj.remove("required")
        .and_then(|r| {
            r.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
        })
        .unwrap_or_default()
}

fn deref<'a>(schema: &Value, root: &'a Value) -> Option<&'a Value> {
    let reference = schema.get("$ref")?.as_str()?;
    let pointer = reference.strip_prefix('#')?;
    root.pointer(pointer)
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

/// The single meaningful branch of a nullable or one-element wrapper.
fn unwrap_wrapper(schema: &Value) -> Option<(&'static str, Value)> {
    for key in ["anyOf", "oneOf"] {
        let Some(branches) = schema.get(key).and_then(Value::as_array) else {
            continue;
        };
        let non_null: Vec<&Value> = branches.iter().filter(|b| !is_null_schema(b)).collect();
        if non_null.len() == 1 && (branches.len() == 1 || non_null.len() < branches.len()) {
            return Some((key, non_null[0].clone()));
        }
    }
    None
}

fn overlay(base: &Value, overrides: &Map<String, Value>, drop: &str) -> Value {
    let mut out = base.as_object().cloned().unwrap_or_default();
    for (k, v) in overrides {
        if k != drop {
            out.insert(k.clone(), v.clone());
        }
    }
    Value::Object(out)
}

/// Follow references, collapse wrappers and merge `allOf` until stable.
pub fn normalize(schema: &Value, root: &Value) -> Value {
    let mut current = schema.clone();
    for _ in 0..MAX_NORMALIZE_STEPS {
        let Some(obj) = current.as_object() else {
            return current;
        };
        if let Some(target) = deref(&current, root) {
            current = overlay(target, obj, "$ref");
            continue;
        }
        if let Some((key, inner)) = unwrap_wrapper(&current) {
            current = overlay(&inner, obj, key);
            continue;
        }
        if let Some(branches) = obj.get("allOf").and_then(Value::as_array) {
            let normalized: Vec<Value> = branches.iter().map(|b| normalize(b, root)).collect();
            let mut with_branches = obj.clone();
            with_branches.insert("allOf".into(), Value::Array(normalized));
            current = merge_all_of(&Value::Object(with_branches));
            continue;
        }
        break;
    }
    current
}

/// Effective schema for `path`.
///
/// Index segments step into `items`; key segments step into
/// `properties[key]`, falling through to an object-valued
/// `additionalProperties` (dictionary entries share one schema).
pub fn sub_schema(path: &Path, root: &Value) -> Result<Value> {
    let mut current = normalize(root, root);
    for seg in path {
        let next = match seg {
            Segment::Index(_) => current.get("items").filter(|v| v.is_object()),
            Segment::Key(key) => current
                .get("properties")
                .and_then(|p| p.get(key))
                .or_else(|| {
                    current
                        .get("additionalProperties")
                        .filter(|v| v.is_object())
                }),
        };
        let Some(next) = next else {
            return Err(Error::path_not_found(path));
        };
        current = normalize(next, root);
    }
    Ok(current)
}

/// The JSON type of a normalized schema.
///
/// `type` arrays yield their first non-`null` entry; untyped schemas are
/// inferred from their keywords.
pub fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => return Some(t.as_str()),
        Some(Value::Array(types)) => {
            if let Some(t) = types.iter().filter_map(Value::as_str).find(|t| *t != "null") {
                return Some(t);
            }
        }
        _ => {}
    }
    if schema.get("properties").is_some() || schema.get("additionalProperties").is_some() {
        Some("object")
    } else if schema.get("items").is_some() {
        Some("array")
    } else if schema.get("enum").is_some() || schema.get("const").is_some() {
        Some("string")
    } else {
        None
    }
}

/// Whether `schema` describes a dictionary (shared schema for every key).
pub fn is_dict(schema: &Value) -> bool {
    schema.get("properties").is_none()
        && schema
            .get("additionalProperties")
            .is_some_and(Value::is_object)
}

/// Whether `key` is listed in `parent`'s `required` array.
pub fn is_required(parent: &Value, key: &str) -> bool {
    parent
        .get("required")
        .and_then(Value::as_array)
        .is_some_and(|r| r.iter().any(|v| v.as_str() == Some(key)))
}

/// Keys of `properties`, in declaration order.
pub fn property_keys(schema: &Value) -> Vec<String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn title(schema: &Value) -> Option<String> {
    schema.get("title").and_then(Value::as_str).map(String::from)
}

pub fn description(schema: &Value) -> Option<String> {
    schema
        .get("description")
        .and_then(Value::as_str)
        .map(String::from)
}

pub fn number(schema: &Value, key: &str) -> Option<f64> {
    schema.get(key).and_then(Value::as_f64)
}

pub fn count(schema: &Value, key: &str) -> Option<usize> {
    schema.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

/// One selectable value of an enum property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumOption {
    pub value: String,
    pub name: String,
}

/// Options of an enum schema.
///
/// Read from `enum` (display names from `Prop.enumNames` or `enumNames`) or
/// from a `oneOf` whose branches are all `const`/single-value `enum`.
pub fn enum_options(schema: &Value) -> Option<Vec<EnumOption>> {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        let names = schema
            .get(directives::PROP)
            .and_then(|p| p.get("enumNames"))
            .or_else(|| schema.get("enumNames"))
            .and_then(Value::as_array);
        return Some(
            values
                .iter()
                .filter_map(Value::as_str)
                .enumerate()
                .map(|(i, v)| EnumOption {
                    value: v.to_string(),
                    name: names
                        .and_then(|n| n.get(i))
                        .and_then(Value::as_str)
                        .unwrap_or(v)
                        .to_string(),
                })
                .collect(),
        );
    }

    if let Some(value) = schema.get("const").and_then(Value::as_str) {
        return Some(vec![EnumOption {
            value: value.to_string(),
            name: title(schema).unwrap_or_else(|| value.to_string()),
        }]);
    }

    let branches = schema.get("oneOf").and_then(Value::as_array)?;
    branches
        .iter()
        .map(|b| {
            let value = b
                .get("const")
                .or_else(|| {
                    b.get("enum")
                        .and_then(Value::as_array)
                        .filter(|e| e.len() == 1)
                        .and_then(|e| e.first())
                })?
                .as_str()?
                .to_string();
            let name = title(b)
                .or_else(|| description(b))
                .unwrap_or_else(|| value.clone());
            Some(EnumOption { value, name })
        })
        .collect()
}

/// Fresh random identifier for `Id`/`KeyGen` strings and setting keys.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Default value for a schema node.
///
/// `materialize` asks for a value even when the schema has no explicit
/// default: objects are built from their children's defaults, arrays are
/// filled up to `minItems`, booleans become `false`, enums their first option.
/// Without it only explicit defaults and generated ids are produced.
pub fn default_value(schema: &Value, root: &Value, materialize: bool) -> Option<Value> {
    let schema = normalize(schema, root);
    if let Some(d) = schema.get("default") {
        return Some(d.clone());
    }
    let prop = directives::prop(&schema, &Path::root()).unwrap_or_default();
    if matches!(
        prop.sub_type,
        Some(StringSubType::Id) | Some(StringSubType::KeyGen)
    ) {
        return Some(Value::String(new_id()));
    }
    if !materialize || (directives::has_link(&schema) && schema_type(&schema) == Some("string")) {
        return None;
    }
    if let Some(options) = enum_options(&schema) {
        return options.first().map(|o| Value::String(o.value.clone()));
    }
    match schema_type(&schema)? {
        "boolean" if prop.false_as_undefined => None,
        "boolean" => Some(Value::Bool(false)),
        "object" if is_dict(&schema) => Some(Value::Object(Map::new())),
        "object" => {
            let mut obj = Map::new();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (key, child) in props {
                    if let Some(v) = default_value(child, root, is_required(&schema, key)) {
                        obj.insert(key.clone(), v);
                    }
                }
            }
            Some(Value::Object(obj))
        }
        "array" => {
            let min = count(&schema, "minItems").unwrap_or(0);
            let items = schema.get("items").cloned().unwrap_or(Value::Null);
            Some(Value::Array(
                (0..min).map(|_| placeholder_value(&items, root)).collect(),
            ))
        }
        _ => None,
    }
}

/// A value that can always be inserted as a new array entry.
pub fn placeholder_value(schema: &Value, root: &Value) -> Value {
    if let Some(v) = default_value(schema, root, true) {
        return v;
    }
    let schema = normalize(schema, root);
    match schema_type(&schema) {
        Some("string") => Value::String(String::new()),
        Some("number") | Some("integer") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

/// Replace every `Id`/`KeyGen` string inside `value` with a fresh id.
///
/// Used when cloning entries so the copy does not share identities.
pub fn regenerate_ids(value: &mut Value, schema: &Value, root: &Value) {
    let schema = normalize(schema, root);
    match value {
        Value::Object(obj) => {
            for (key, child) in obj.iter_mut() {
                let child_schema = schema
                    .get("properties")
                    .and_then(|p| p.get(key))
                    .or_else(|| schema.get("additionalProperties").filter(|v| v.is_object()));
                if let Some(child_schema) = child_schema {
                    regenerate_ids(child, child_schema, root);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for item in items {
                    regenerate_ids(item, item_schema, root);
                }
            }
        }
        Value::String(s) => {
            let prop = directives::prop(&schema, &Path::root()).unwrap_or_default();
            if matches!(
                prop.sub_type,
                Some(StringSubType::Id) | Some(StringSubType::KeyGen)
            ) {
                *s = new_id();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::path;

    #[test]
    fn test_all_of_merge() {
        let schema = json!({
            "allOf": [
                {"properties": {"a": {"type": "string"}}},
                {"properties": {"b": {"type": "number"}}},
                {"required": ["a"]}
            ]
        });
        let merged = merge_all_of(&schema);
        assert_eq!(property_keys(&merged), vec!["a", "b"]);
        assert!(is_required(&merged, "a"));
        assert!(!is_required(&merged, "b"));
        assert!(merged.get("allOf").is_none());
    }

    #[test]
    fn test_all_of_last_write_wins() {
        let schema = json!({
            "properties": {"a": {"type": "string"}},
            "required": ["a"],
            "allOf": [
                {"properties": {"a": {"type": "integer"}}, "required": ["a", "c"], "title": "T"}
            ]
        });
        let merged = merge_all_of(&schema);
        assert_eq!(merged["properties"]["a"]["type"], "integer");
        assert_eq!(merged["required"], json!(["a", "c"]));
        assert_eq!(merged["title"], "T");
    }

    #[test]
    fn test_sub_schema_walks_items_and_dicts() {
        let root = json!({
            "type": "object",
            "properties": {
                "list": {"type": "array", "items": {"type": "object", "properties": {"x": {"type": "integer"}}}},
                "dict": {"type": "object", "additionalProperties": {"type": "string"}}
            }
        });
        let s = sub_schema(&path!["list", 3, "x"], &root).unwrap();
        assert_eq!(schema_type(&s), Some("integer"));
        let d = sub_schema(&path!["dict", "anything"], &root).unwrap();
        assert_eq!(schema_type(&d), Some("string"));
        assert!(matches!(
            sub_schema(&path!["missing"], &root),
            Err(Error::PathNotFound { .. })
        ));
        assert!(matches!(
            sub_schema(&path!["list", "x"], &root),
            Err(Error::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_refs_and_nullable_wrappers() {
        let root = json!({
            "type": "object",
            "properties": {
                "inner": {"anyOf": [{"$ref": "#/$defs/Inner"}, {"type": "null"}], "description": "Inner"}
            },
            "$defs": {
                "Inner": {"type": "object", "properties": {"flag": {"type": ["boolean", "null"]}}}
            }
        });
        let inner = sub_schema(&path!["inner"], &root).unwrap();
        assert_eq!(schema_type(&inner), Some("object"));
        assert_eq!(description(&inner).as_deref(), Some("Inner"));
        let flag = sub_schema(&path!["inner", "flag"], &root).unwrap();
        assert_eq!(schema_type(&flag), Some("boolean"));
    }

    #[test]
    fn test_enum_options() {
        let plain = json!({"type": "string", "enum": ["a", "b"], "Prop": {"enumNames": ["Alpha"]}});
        let opts = enum_options(&plain).unwrap();
        assert_eq!(opts[0].name, "Alpha");
        assert_eq!(opts[1].name, "b");

        let one_of = json!({"oneOf": [
            {"const": "x", "description": "The X"},
            {"type": "string", "enum": ["y"]}
        ]});
        let opts = enum_options(&one_of).unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].name, "The X");
        assert_eq!(opts[1].value, "y");
    }

    #[test]
    fn test_default_value_cascade() {
        let schema = json!({
            "type": "object",
            "required": ["id", "enabled", "tags", "name"],
            "properties": {
                "id": {"type": "string", "Prop": {"subType": "Id"}},
                "name": {"type": "string"},
                "enabled": {"type": "boolean"},
                "tags": {"type": "array", "items": {"type": "string"}, "minItems": 2},
                "optional": {"type": "object", "properties": {}},
                "level": {"type": "integer", "default": 3}
            }
        });
        let v = default_value(&schema, &schema, true).unwrap();
        assert_eq!(v["id"].as_str().map(str::len), Some(32));
        assert!(v.get("name").is_none());
        assert_eq!(v["enabled"], json!(false));
        assert_eq!(v["tags"], json!(["", ""]));
        assert!(v.get("optional").is_none());
        assert_eq!(v["level"], json!(3));
    }

    #[test]
    fn test_regenerate_ids() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "Prop": {"subType": "Id"}},
                "name": {"type": "string"}
            }
        });
        let mut v = json!({"id": "abc", "name": "n"});
        regenerate_ids(&mut v, &schema, &schema);
        assert_ne!(v["id"], json!("abc"));
        assert_eq!(v["name"], json!("n"));
    }
}
