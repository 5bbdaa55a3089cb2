//! REST dispatch helpers
//!
//! Turn the schema's REST mapping into concrete requests: render path
//! templates (`{id}`, `{inputName}`), body templates (`${inputName}`,
//! `${json:inputName}`), and map response fields back onto output
//! properties.

use crate::error::{ProviderError, Result};
use crate::resource::property::get_path;
use crate::resource::registry::{PropertyDef, PropertyType};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ProviderError::Config(format!("invalid HTTP method in schema: {}", method)))
}

/// String form of a value used inside a path or ID
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn render_placeholders(
    template: &str,
    id: Option<&str>,
    values: &Map<String, Value>,
    encode: bool,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let key = &after[..end];
        let text = match (key, id) {
            ("id", Some(id)) => id.to_string(),
            _ => values
                .get(key)
                .and_then(scalar_text)
                .ok_or_else(|| ProviderError::InvalidProperty {
                    property: key.to_string(),
                    message: format!("required to build request path {}", template),
                })?,
        };
        if encode {
            out.push_str(&urlencoding::encode(&text));
        } else {
            out.push_str(&text);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Render a path template; substituted values are URL-encoded
pub fn render_path(template: &str, id: Option<&str>, values: &Map<String, Value>) -> Result<String> {
    render_placeholders(template, id, values, true)
}

/// Render an ID template verbatim
pub fn render_id(template: &str, values: &Map<String, Value>) -> Result<String> {
    render_placeholders(template, None, values, false)
}

/// Render a body template. Absent or null substitutions drop their key;
/// objects emptied that way are dropped too. `None` means no body.
pub fn render_body(template: &Value, values: &Map<String, Value>) -> Result<Option<Value>> {
    match template {
        Value::String(s) => render_string(s, values),
        Value::Object(map) => {
            let mut rendered = Map::new();
            for (key, item) in map {
                if let Some(v) = render_body(item, values)? {
                    rendered.insert(key.clone(), v);
                }
            }
            if rendered.is_empty() && !map.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::Object(rendered)))
            }
        },
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = render_body(item, values)? {
                    rendered.push(v);
                }
            }
            Ok(Some(Value::Array(rendered)))
        },
        other => Ok(Some(other.clone())),
    }
}

fn render_string(s: &str, values: &Map<String, Value>) -> Result<Option<Value>> {
    let Some(inner) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) else {
        return Ok(Some(Value::String(s.to_string())));
    };

    let (name, parse_json) = match inner.strip_prefix("json:") {
        Some(name) => (name, true),
        None => (inner, false),
    };

    let value = match values.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    match (parse_json, value) {
        (true, Value::String(text)) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| ProviderError::InvalidProperty {
                property: name.to_string(),
                message: format!("not valid JSON: {}", e),
            }),
        _ => Ok(Some(value.clone())),
    }
}

/// Fit a response value to the declared property type
pub fn coerce(kind: PropertyType, value: Value) -> Value {
    match (kind, value) {
        (PropertyType::String, v @ (Value::Object(_) | Value::Array(_))) => {
            Value::String(v.to_string())
        },
        (PropertyType::Array, v @ Value::Object(_)) => Value::Array(vec![v]),
        (_, v) => v,
    }
}

/// Pick mapped response fields; missing fields are skipped
pub fn map_outputs(
    mapping: &HashMap<String, String>,
    response: &Value,
    properties: &BTreeMap<String, PropertyDef>,
) -> Map<String, Value> {
    let mut outputs = Map::new();
    for (property, path) in mapping {
        let Some(value) = get_path(response, path) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let value = match properties.get(property) {
            Some(def) => coerce(def.kind, value.clone()),
            None => value.clone(),
        };
        outputs.insert(property.clone(), value);
    }
    outputs
}

/// Read the new resource's ID from a create response
pub fn extract_id(response: &Value, id_path: &str) -> Result<String> {
    get_path(response, id_path)
        .and_then(scalar_text)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Decode(format!("response has no '{}' field", id_path)))
}

/// First list item whose fields equal every present match argument
pub fn find_item<'a>(
    items: &'a [Value],
    criteria: &BTreeMap<String, String>,
    args: &Map<String, Value>,
) -> Option<&'a Value> {
    items.iter().find(|item| {
        criteria.iter().all(|(path, arg)| match args.get(arg) {
            None | Some(Value::Null) => true,
            Some(expected) => get_path(item, path) == Some(expected),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_path() {
        let values = obj(json!({"clusterId": "c 1", "n": 3}));
        assert_eq!(
            render_path("/v1/kubernetes/clusters/{clusterId}/node-configurations/{id}", Some("x"), &values)
                .unwrap(),
            "/v1/kubernetes/clusters/c%201/node-configurations/x"
        );
        assert_eq!(render_path("/a/{n}", None, &values).unwrap(), "/a/3");
    }

    #[test]
    fn test_render_path_missing_value() {
        let err = render_path("/v1/organizations/{organizationId}/x", None, &Map::new()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidProperty { property, .. } if property == "organizationId"));
    }

    #[test]
    fn test_render_id_is_not_encoded() {
        let values = obj(json!({"clusterId": "a/b"}));
        assert_eq!(render_id("{clusterId}", &values).unwrap(), "a/b");
        assert_eq!(render_id("commitments", &values).unwrap(), "commitments");
    }

    #[test]
    fn test_render_body_drops_absent_values() {
        let template = json!({
            "name": "${name}",
            "eks": {"accountId": "${accountId}", "assumeRoleArn": "${assumeRoleArn}"},
            "gke": {"projectId": "${projectId}"},
            "keepKubernetesResources": true
        });
        let values = obj(json!({"name": "prod", "accountId": "123", "assumeRoleArn": null}));
        assert_eq!(
            render_body(&template, &values).unwrap(),
            Some(json!({
                "name": "prod",
                "eks": {"accountId": "123"},
                "keepKubernetesResources": true
            }))
        );
    }

    #[test]
    fn test_render_body_keeps_types_and_empty_string() {
        let template = json!({"flag": "${flag}", "list": "${list}", "s": "${s}"});
        let values = obj(json!({"flag": false, "list": ["a"], "s": ""}));
        assert_eq!(
            render_body(&template, &values).unwrap(),
            Some(json!({"flag": false, "list": ["a"], "s": ""}))
        );
    }

    #[test]
    fn test_render_body_json_substitution() {
        let template = json!("${json:policies}");
        let values = obj(json!({"policies": "{\"enabled\": true}"}));
        assert_eq!(render_body(&template, &values).unwrap(), Some(json!({"enabled": true})));
        assert_eq!(render_body(&template, &Map::new()).unwrap(), None);

        let bad = obj(json!({"policies": "{not json"}));
        assert!(render_body(&template, &bad).is_err());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(PropertyType::String, json!({"a": 1})), json!("{\"a\":1}"));
        assert_eq!(coerce(PropertyType::Array, json!({"a": 1})), json!([{"a": 1}]));
        assert_eq!(coerce(PropertyType::String, json!("x")), json!("x"));
    }

    #[test]
    fn test_extract_id() {
        assert_eq!(extract_id(&json!({"id": "abc"}), "id").unwrap(), "abc");
        assert_eq!(extract_id(&json!({"template": {"name": "t"}}), "template.name").unwrap(), "t");
        assert!(extract_id(&json!({}), "id").is_err());
        assert!(extract_id(&json!({"id": ""}), "id").is_err());
    }

    #[test]
    fn test_find_item_matches_present_args_only() {
        let items = vec![
            json!({"id": "1", "name": "dev", "cloud": "aws"}),
            json!({"id": "2", "name": "prod", "cloud": "gcp"}),
        ];
        let criteria: BTreeMap<String, String> =
            [("id".to_string(), "id".to_string()), ("name".to_string(), "name".to_string())]
                .into_iter()
                .collect();
        let found = find_item(&items, &criteria, &obj(json!({"name": "prod"}))).unwrap();
        assert_eq!(found["id"], "2");
        assert!(find_item(&items, &criteria, &obj(json!({"name": "qa"}))).is_none());
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("patch").unwrap(), Method::PATCH);
    }
}
