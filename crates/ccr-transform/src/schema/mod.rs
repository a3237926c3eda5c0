//! JSON-Schema normalization for tool parameter definitions (spec §4.2).

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("JSON-Schema node carries both `type` and `anyOf`")]
    TypeWithAnyOf,
    #[error("JSON-Schema node is a lone `type: \"null\"`")]
    LoneNullType,
}

const WHITELIST: &[&str] = &[
    "type",
    "format",
    "title",
    "description",
    "nullable",
    "enum",
    "maxItems",
    "minItems",
    "properties",
    "required",
    "minProperties",
    "maxProperties",
    "minLength",
    "maxLength",
    "pattern",
    "example",
    "anyOf",
    "propertyOrdering",
    "default",
    "items",
    "minimum",
    "maximum",
];

/// Recursively strips keys outside the whitelist. Property names under a
/// `properties` map are never treated as schema keys themselves, so they
/// survive regardless of the whitelist.
pub fn cleanup_parameters(node: &mut Value) {
    let Value::Object(map) = node else { return };

    map.retain(|key, _| WHITELIST.contains(&key.as_str()));
    normalize_enum_and_format(map);

    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for (_, schema) in properties.iter_mut() {
            cleanup_parameters(schema);
        }
    }
    if let Some(items) = map.get_mut("items") {
        cleanup_parameters(items);
    }
    if let Some(Value::Array(variants)) = map.get_mut("anyOf") {
        for variant in variants.iter_mut() {
            cleanup_parameters(variant);
        }
    }
}

fn normalize_enum_and_format(map: &mut Map<String, Value>) {
    let type_str = map.get("type").and_then(Value::as_str).map(str::to_string);
    match type_str.as_deref() {
        Some("string") => {
            let keep_format = matches!(
                map.get("format").and_then(Value::as_str),
                Some("enum") | Some("date-time")
            );
            if !keep_format {
                map.remove("format");
            }
        }
        Some(_) => {
            map.remove("enum");
            map.remove("format");
        }
        None => {}
    }
}

/// JSON-Schema -> Gemini-dialect schema (spec §4.2).
pub fn process_json_schema(node: Value) -> Result<Value, SchemaError> {
    let Value::Object(mut map) = node else {
        return Ok(node);
    };

    map.remove("additionalProperties");

    let has_type = map.contains_key("type");
    let has_any_of = map.contains_key("anyOf");
    if has_type && has_any_of {
        return Err(SchemaError::TypeWithAnyOf);
    }

    if let Some(type_value) = map.remove("type") {
        match type_value {
            Value::Array(types) => {
                let names: Vec<String> = types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                apply_flattened_type(&mut map, &names)?;
            }
            Value::String(name) => {
                if name == "null" {
                    return Err(SchemaError::LoneNullType);
                }
                map.insert("type".to_string(), Value::String(map_type_name(&name)));
            }
            other => {
                map.insert("type".to_string(), other);
            }
        }
    }

    if let Some(Value::Array(variants)) = map.get("anyOf") {
        if variants.len() == 2 {
            if let Some(collapsed) = try_collapse_nullable_any_of(variants)? {
                map.remove("anyOf");
                map.insert("nullable".to_string(), Value::Bool(true));
                merge_object(&mut map, collapsed);
                return process_json_schema(Value::Object(map));
            }
        }
        let variants = map.remove("anyOf").unwrap();
        if let Value::Array(variants) = variants {
            let processed: Result<Vec<Value>, SchemaError> =
                variants.into_iter().map(process_json_schema).collect();
            map.insert("anyOf".to_string(), Value::Array(processed?));
        }
    }

    if let Some(items) = map.remove("items") {
        map.insert("items".to_string(), process_json_schema(items)?);
    }

    if let Some(Value::Object(properties)) = map.remove("properties") {
        let mut processed = Map::new();
        for (key, schema) in properties {
            processed.insert(key, process_json_schema(schema)?);
        }
        map.insert("properties".to_string(), Value::Object(processed));
    }

    Ok(Value::Object(map))
}

fn apply_flattened_type(map: &mut Map<String, Value>, names: &[String]) -> Result<(), SchemaError> {
    let is_nullable = names.iter().any(|name| name == "null");
    let non_null: Vec<&String> = names.iter().filter(|name| *name != "null").collect();

    if is_nullable {
        map.insert("nullable".to_string(), Value::Bool(true));
    }

    match non_null.len() {
        0 => return Err(SchemaError::LoneNullType),
        1 => {
            map.insert(
                "type".to_string(),
                Value::String(map_type_name(non_null[0])),
            );
        }
        _ => {
            let variants = non_null
                .into_iter()
                .map(|name| {
                    let mut variant = Map::new();
                    variant.insert("type".to_string(), Value::String(map_type_name(name)));
                    Value::Object(variant)
                })
                .collect();
            map.insert("anyOf".to_string(), Value::Array(variants));
        }
    }

    Ok(())
}

fn try_collapse_nullable_any_of(variants: &[Value]) -> Result<Option<Value>, SchemaError> {
    let is_null_marker = |value: &Value| {
        matches!(
            value.get("type").and_then(Value::as_str),
            Some("null")
        ) && value.as_object().map(Map::len) == Some(1)
    };

    let null_count = variants.iter().filter(|v| is_null_marker(v)).count();
    if null_count != 1 {
        return Ok(None);
    }
    let other = variants.iter().find(|v| !is_null_marker(v)).cloned();
    Ok(other)
}

fn merge_object(into: &mut Map<String, Value>, other: Value) {
    if let Value::Object(other) = other {
        for (key, value) in other {
            into.insert(key, value);
        }
    }
}

fn map_type_name(name: &str) -> String {
    match name {
        "string" => "STRING",
        "number" => "NUMBER",
        "integer" => "INTEGER",
        "boolean" => "BOOLEAN",
        "array" => "ARRAY",
        "object" => "OBJECT",
        "null" => "NULL",
        _ => "TYPE_UNSPECIFIED",
    }
    .to_string()
}

/// `tTool`: normalize one function declaration's `parameters` value into the
/// Gemini-wire `parametersJsonSchema` value (spec §4.2). A tool that already
/// declares `$schema` is treated as raw JSON-Schema passthrough (with
/// `$schema` stripped, per the UnifiedTool invariant); otherwise it is run
/// through the Gemini-dialect conversion.
pub fn t_tool_parameters(parameters: &Value) -> Result<Value, SchemaError> {
    let carries_schema_marker = parameters
        .as_object()
        .map(|map| map.contains_key("$schema"))
        .unwrap_or(false);

    if carries_schema_marker {
        let mut value = parameters.clone();
        if let Value::Object(map) = &mut value {
            map.remove("$schema");
        }
        Ok(value)
    } else {
        process_json_schema(parameters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cleanup_parameters_is_noop_on_already_clean_object() {
        let mut value = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"}
            },
            "required": ["name"]
        });
        let before = value.clone();
        cleanup_parameters(&mut value);
        assert_eq!(value, before);
    }

    #[test]
    fn cleanup_parameters_preserves_arbitrary_property_names() {
        let mut value = json!({
            "type": "object",
            "properties": {
                "$schema-ish-name": {"type": "string", "bogus": 1}
            }
        });
        cleanup_parameters(&mut value);
        assert!(value["properties"]["$schema-ish-name"].is_object());
        assert!(value["properties"]["$schema-ish-name"].get("bogus").is_none());
    }

    #[test]
    fn cleanup_parameters_drops_enum_on_non_string_type() {
        let mut value = json!({"type": "integer", "enum": [1, 2, 3]});
        cleanup_parameters(&mut value);
        assert!(value.get("enum").is_none());
    }

    #[test]
    fn cleanup_parameters_keeps_format_enum_and_date_time() {
        let mut value = json!({"type": "string", "format": "date-time"});
        cleanup_parameters(&mut value);
        assert_eq!(value["format"], "date-time");

        let mut value = json!({"type": "string", "format": "uuid"});
        cleanup_parameters(&mut value);
        assert!(value.get("format").is_none());
    }

    #[test]
    fn process_json_schema_uppercases_type() {
        let value = json!({"type": "string"});
        let processed = process_json_schema(value).unwrap();
        assert_eq!(processed["type"], "STRING");
    }

    #[test]
    fn process_json_schema_unknown_type_becomes_unspecified() {
        let value = json!({"type": "weird"});
        let processed = process_json_schema(value).unwrap();
        assert_eq!(processed["type"], "TYPE_UNSPECIFIED");
    }

    #[test]
    fn process_json_schema_flattens_nullable_type_array_to_scalar() {
        let value = json!({"type": ["string", "null"]});
        let processed = process_json_schema(value).unwrap();
        assert_eq!(processed["type"], "STRING");
        assert_eq!(processed["nullable"], true);
    }

    #[test]
    fn process_json_schema_flattens_multi_type_array_to_any_of() {
        let value = json!({"type": ["string", "integer"]});
        let processed = process_json_schema(value).unwrap();
        let any_of = processed["anyOf"].as_array().unwrap();
        assert_eq!(any_of.len(), 2);
        assert_eq!(any_of[0]["type"], "STRING");
        assert_eq!(any_of[1]["type"], "INTEGER");
    }

    #[test]
    fn process_json_schema_collapses_two_element_any_of_with_null() {
        let value = json!({"anyOf": [{"type": "null"}, {"type": "string"}]});
        let processed = process_json_schema(value).unwrap();
        assert_eq!(processed["nullable"], true);
        assert_eq!(processed["type"], "STRING");
    }

    #[test]
    fn process_json_schema_rejects_type_with_any_of() {
        let value = json!({"type": "string", "anyOf": [{"type": "integer"}]});
        assert_eq!(
            process_json_schema(value).unwrap_err(),
            SchemaError::TypeWithAnyOf
        );
    }

    #[test]
    fn process_json_schema_rejects_lone_null_type() {
        let value = json!({"type": "null"});
        assert_eq!(
            process_json_schema(value).unwrap_err(),
            SchemaError::LoneNullType
        );
    }

    #[test]
    fn process_json_schema_is_idempotent_on_whitelisted_input() {
        let value = json!({
            "type": "object",
            "properties": {"count": {"type": "integer"}}
        });
        let once = process_json_schema(value).unwrap();
        let twice = process_json_schema(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn process_json_schema_recurses_into_items_and_properties() {
        let value = json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": ["string", "null"]}}
            }
        });
        let processed = process_json_schema(value).unwrap();
        let items = &processed["properties"]["tags"]["items"];
        assert_eq!(items["type"], "STRING");
        assert_eq!(items["nullable"], true);
    }

    #[test]
    fn t_tool_parameters_strips_schema_marker_without_dialect_conversion() {
        let value = json!({"$schema": "http://json-schema.org/draft-07/schema#", "type": "string"});
        let result = t_tool_parameters(&value).unwrap();
        assert!(result.get("$schema").is_none());
        assert_eq!(result["type"], "string");
    }

    #[test]
    fn t_tool_parameters_runs_dialect_conversion_without_schema_marker() {
        let value = json!({"type": "string"});
        let result = t_tool_parameters(&value).unwrap();
        assert_eq!(result["type"], "STRING");
    }
}
