//! Provider plugin surface
//!
//! [`ProviderService`] is what a hosting runtime calls: configure once, then
//! check / diff / create / read / update / delete resources and invoke data
//! sources. `check` and `diff` are schema-driven and shared by every
//! implementation; the remote operations are implemented by
//! [`castai::CastAiProvider`] through the data-driven [`dispatch`] helpers.

pub mod castai;
pub mod dispatch;
pub mod policies;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::resource::registry::{get_resource_schema, ResourceSchema};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub use self::castai::CastAiProvider;

/// A single validation failure reported by `check`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

/// Inputs with defaults applied, plus any failures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub inputs: Map<String, Value>,
    pub failures: Vec<CheckFailure>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// First failure as an error
    pub fn into_result(self, token: &str) -> Result<Map<String, Value>> {
        match self.failures.into_iter().next() {
            None => Ok(self.inputs),
            Some(f) if f.reason.starts_with("Missing required property") => {
                Err(ProviderError::missing(token, &f.property))
            },
            Some(f) => Err(ProviderError::InvalidProperty {
                property: f.property,
                message: f.reason,
            }),
        }
    }
}

/// Changed input keys and the subset that forces replacement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    pub changes: Vec<String>,
    pub replaces: Vec<String>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        !self.replaces.is_empty()
    }
}

/// ID and output state of a created resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateResult {
    pub id: String,
    pub outputs: Map<String, Value>,
}

/// Current state of a resource as read from the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    pub id: String,
    pub outputs: Map<String, Value>,
}

fn schema_for(token: &str) -> Result<&'static ResourceSchema> {
    get_resource_schema(token).ok_or_else(|| ProviderError::UnknownType(token.to_string()))
}

/// Validate inputs against a schema and apply defaults
pub fn check_inputs(schema: &ResourceSchema, news: &Map<String, Value>) -> CheckResult {
    let mut inputs = news.clone();
    for (name, default) in schema.defaults() {
        if inputs.get(&name).map_or(true, Value::is_null) {
            inputs.insert(name, default);
        }
    }

    let mut failures = Vec::new();
    for name in schema.required_inputs() {
        if inputs.get(name).map_or(true, Value::is_null) {
            failures.push(CheckFailure {
                property: name.to_string(),
                reason: format!("Missing required property '{}'", name),
            });
        }
    }

    for (name, value) in &inputs {
        if value.is_null() {
            continue;
        }
        match schema.property(name) {
            Some(prop) if !prop.output && !prop.kind.accepts(value) => {
                failures.push(CheckFailure {
                    property: name.clone(),
                    reason: format!("expected {}", prop.kind),
                });
            },
            Some(_) => {},
            None => tracing::debug!("{}: passing through undeclared input '{}'", schema.token, name),
        }
    }

    CheckResult { inputs, failures }
}

/// Compare two input sets; absent and null are equal
pub fn diff_inputs(
    schema: &ResourceSchema,
    olds: &Map<String, Value>,
    news: &Map<String, Value>,
) -> DiffResult {
    let mut keys: Vec<&String> = olds.keys().chain(news.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut diff = DiffResult::default();
    for key in keys {
        if schema.property(key).is_some_and(|p| p.output) {
            continue;
        }
        let old = olds.get(key).unwrap_or(&Value::Null);
        let new = news.get(key).unwrap_or(&Value::Null);
        if old != new {
            diff.changes.push(key.clone());
            if schema.property(key).is_some_and(|p| p.force_new) {
                diff.replaces.push(key.clone());
            }
        }
    }
    diff
}

/// The plugin contract between a hosting runtime and this provider
#[async_trait]
pub trait ProviderService: Send + Sync {
    /// Stable provider identifier
    fn name(&self) -> &str {
        "castai"
    }

    async fn configure(&self, config: ProviderConfig) -> Result<()>;

    /// Required and type checks; returns inputs with defaults applied
    async fn check(&self, token: &str, news: &Map<String, Value>) -> Result<CheckResult> {
        Ok(check_inputs(schema_for(token)?, news))
    }

    async fn diff(
        &self,
        token: &str,
        _id: &str,
        olds: &Map<String, Value>,
        news: &Map<String, Value>,
    ) -> Result<DiffResult> {
        Ok(diff_inputs(schema_for(token)?, olds, news))
    }

    async fn create(&self, token: &str, inputs: &Map<String, Value>) -> Result<CreateResult>;

    /// `Ok(None)` when the backend no longer has the resource
    async fn read(
        &self,
        token: &str,
        id: &str,
        state: &Map<String, Value>,
    ) -> Result<Option<ReadResult>>;

    async fn update(
        &self,
        token: &str,
        id: &str,
        olds: &Map<String, Value>,
        news: &Map<String, Value>,
    ) -> Result<Map<String, Value>>;

    async fn delete(&self, token: &str, id: &str, state: &Map<String, Value>) -> Result<()>;

    async fn invoke(&self, token: &str, args: &Map<String, Value>) -> Result<Map<String, Value>>;
}
