//! Schema Registry - Load resource and data source schemas from JSON
//!
//! Every CAST AI resource type and data source is described by a declarative
//! entry in `src/resources/*.json`: its properties (required, defaulted,
//! output-only, secret) and the REST mapping the provider uses. The tables are
//! embedded at compile time and parsed once on first access.

use super::token::{is_canonical, DATA_SOURCE_SUFFIX};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Embedded schema JSON files (compiled into the binary)
const SCHEMA_FILES: &[&str] = &[
    include_str!("../resources/index.json"),
    include_str!("../resources/aws.json"),
    include_str!("../resources/gcp.json"),
    include_str!("../resources/azure.json"),
    include_str!("../resources/autoscaling.json"),
    include_str!("../resources/nodeconfig.json"),
    include_str!("../resources/rebalancing.json"),
    include_str!("../resources/organization.json"),
    include_str!("../resources/iam.json"),
    include_str!("../resources/workload.json"),
    include_str!("../resources/security.json"),
];

/// Wire type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Boolean,
    Integer,
    Number,
    Array,
    Map,
    Object,
}

impl PropertyType {
    /// Whether a JSON value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Number => value.is_number(),
            PropertyType::Array => value.is_array(),
            PropertyType::Map | PropertyType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Array => "array",
            PropertyType::Map => "map",
            PropertyType::Object => "object",
        };
        f.write_str(s)
    }
}

/// Property definition from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Must be present at creation
    #[serde(default)]
    pub required: bool,
    /// Computed by the backend, never an input
    #[serde(default)]
    pub output: bool,
    /// Value must be redacted by the host
    #[serde(default)]
    pub secret: bool,
    /// Changing this property replaces the resource
    #[serde(default)]
    pub force_new: bool,
    /// Applied by `check` when the input is absent
    #[serde(default)]
    pub default: Option<Value>,
}

/// One REST call of a lifecycle operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDef {
    pub method: String,
    /// Path template with `{id}` and `{inputName}` placeholders
    pub path: String,
    /// Body template with `${inputName}` substitutions
    #[serde(default)]
    pub body: Option<Value>,
    /// Output property -> dot path into the response ("" is the whole body)
    #[serde(default)]
    pub outputs: HashMap<String, String>,
}

/// REST mapping of a resource type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDef {
    /// Dot path of the ID in the create response
    #[serde(default = "default_id_path")]
    pub id_path: String,
    /// ID derived from inputs instead of the create response
    #[serde(default)]
    pub id_template: Option<String>,
    pub create: CallDef,
    /// Calls issued after create, with the new `{id}` available
    #[serde(default)]
    pub post_create: Vec<CallDef>,
    #[serde(default)]
    pub read: Option<CallDef>,
    #[serde(default)]
    pub update: Option<CallDef>,
    #[serde(default)]
    pub delete: Vec<CallDef>,
}

fn default_id_path() -> String {
    "id".to_string()
}

/// Resource schema from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(skip)]
    pub token: String,
    #[serde(default)]
    pub description: String,
    pub properties: BTreeMap<String, PropertyDef>,
    #[serde(default)]
    pub api: Option<ApiDef>,
}

impl ResourceSchema {
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// Names of inputs that must be present at creation
    pub fn required_inputs(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.required && !p.output)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Names of properties only the backend computes
    pub fn output_only(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.output)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Outputs that must be registered as `additional_secret_outputs`
    pub fn secret_outputs(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|(_, p)| p.secret)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Default values for optional inputs
    pub fn defaults(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter(|(_, p)| !p.output)
            .filter_map(|(k, p)| p.default.clone().map(|d| (k.clone(), d)))
            .collect()
    }

    /// Properties whose change forces replacement
    pub fn force_new(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.force_new)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Query mapping of a data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDef {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: Option<Value>,
    /// Dot path of the list to search; absent for single-object responses
    #[serde(default)]
    pub items_path: Option<String>,
    /// Item dot path -> argument name, all present arguments must match
    #[serde(default)]
    pub r#match: BTreeMap<String, String>,
    /// Result `id` derived from arguments
    #[serde(default)]
    pub id_template: Option<String>,
    #[serde(default)]
    pub outputs: HashMap<String, String>,
}

/// Data source schema from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceSchema {
    #[serde(skip)]
    pub token: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub args: BTreeMap<String, PropertyDef>,
    #[serde(default)]
    pub results: BTreeMap<String, PropertyDef>,
    #[serde(default)]
    pub api: Option<QueryDef>,
    /// Name of a result computed in-process instead of over HTTP
    #[serde(default)]
    pub local: Option<String>,
}

impl DataSourceSchema {
    pub fn required_args(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceSchema>,
    #[serde(default)]
    pub data_sources: HashMap<String, DataSourceSchema>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<SchemaConfig> = OnceLock::new();

/// Get the schema registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static SchemaConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = SchemaConfig::default();

        for content in SCHEMA_FILES {
            let partial: SchemaConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded schema JSON: {}", e));
            for (token, mut schema) in partial.resources {
                assert!(is_canonical(&token, ""), "Malformed resource token: {}", token);
                schema.token = token.clone();
                final_config.resources.insert(token, schema);
            }
            for (token, mut schema) in partial.data_sources {
                assert!(
                    is_canonical(&token, DATA_SOURCE_SUFFIX),
                    "Malformed data source token: {}",
                    token
                );
                schema.token = token.clone();
                final_config.data_sources.insert(token, schema);
            }
        }

        final_config
    })
}

/// Get a resource schema by type token
pub fn get_resource_schema(token: &str) -> Option<&'static ResourceSchema> {
    get_registry().resources.get(token)
}

/// Get a data source schema by type token
pub fn get_data_source_schema(token: &str) -> Option<&'static DataSourceSchema> {
    get_registry().data_sources.get(token)
}

/// All registered resource tokens, sorted
pub fn all_resource_tokens() -> Vec<&'static str> {
    let mut tokens: Vec<&str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    tokens.sort_unstable();
    tokens
}

/// All registered data source tokens, sorted
pub fn all_data_source_tokens() -> Vec<&'static str> {
    let mut tokens: Vec<&str> = get_registry()
        .data_sources
        .keys()
        .map(|s| s.as_str())
        .collect();
    tokens.sort_unstable();
    tokens
}
