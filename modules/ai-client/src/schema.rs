use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Keywords strict structured-output mode rejects.
const UNSUPPORTED_KEYWORDS: &[&str] = &["format", "default", "minimum", "maximum", "title"];

/// Types usable as a structured-output answer.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// JSON Schema in the strict dialect: every object closed with
    /// `additionalProperties: false`, every property listed in `required`
    /// (nullable ones included), no `$ref`, no unsupported keywords.
    fn strict_schema() -> Value {
        let root = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        let definitions = root.get("definitions").cloned().unwrap_or(Value::Null);

        let mut schema = strictify(root, &definitions);
        if let Value::Object(map) = &mut schema {
            map.remove("definitions");
            map.remove("$schema");
        }
        schema
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn strictify(value: Value, definitions: &Value) -> Value {
    match value {
        Value::Object(map) => strictify_object(map, definitions),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| strictify(item, definitions))
                .collect(),
        ),
        other => other,
    }
}

fn strictify_object(mut map: Map<String, Value>, definitions: &Value) -> Value {
    if let Some(Value::String(path)) = map.get("$ref") {
        let target = path
            .strip_prefix("#/definitions/")
            .and_then(|name| definitions.get(name))
            .cloned();
        if let Some(target) = target {
            return strictify(target, definitions);
        }
    }

    // schemars wraps described references as a single-element allOf.
    if let Some(Value::Array(all_of)) = map.get("allOf") {
        if all_of.len() == 1 {
            let inner = all_of[0].clone();
            let description = map.remove("description");
            let mut resolved = strictify(inner, definitions);
            if let (Value::Object(obj), Some(description)) = (&mut resolved, description) {
                obj.entry("description").or_insert(description);
            }
            return resolved;
        }
    }

    let is_object = map.get("type") == Some(&Value::String("object".to_string()));
    let is_nested_schema = map.contains_key("type") || map.contains_key("anyOf");

    let mut out = Map::with_capacity(map.len());
    for (key, child) in map {
        if is_nested_schema && UNSUPPORTED_KEYWORDS.contains(&key.as_str()) && !child.is_object() {
            continue;
        }
        let child = match key.as_str() {
            // Property maps hold names, not schemas: recurse into values only.
            "properties" | "definitions" => match child {
                Value::Object(props) => Value::Object(
                    props
                        .into_iter()
                        .map(|(name, schema)| (name, strictify(schema, definitions)))
                        .collect(),
                ),
                other => other,
            },
            "enum" | "required" => child,
            _ => strictify(child, definitions),
        };
        out.insert(key, child);
    }

    if is_object {
        out.insert("additionalProperties".to_string(), Value::Bool(false));
        let required: Vec<Value> = out
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().map(Value::String).collect())
            .unwrap_or_default();
        out.insert("required".to_string(), Value::Array(required));
    }

    Value::Object(out)
}
