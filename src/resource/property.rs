//! Property values, inputs and eventual outputs
//!
//! Inputs are collected with the [`Inputs`] builder. A value may be a plain
//! JSON literal, a secret literal, or an [`Output`] of another resource; the
//! latter creates a dependency edge that is awaited before registration.

use crate::error::{ProviderError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// A resolved output: its value, secrecy and the URNs it depends on
#[derive(Debug, Clone, PartialEq)]
pub struct OutputValue {
    pub value: Value,
    pub secret: bool,
    pub dependencies: Vec<String>,
}

impl OutputValue {
    pub fn plain(value: Value) -> Self {
        Self {
            value,
            secret: false,
            dependencies: Vec::new(),
        }
    }
}

type SharedOutput = Shared<BoxFuture<'static, Result<OutputValue>>>;

/// A value that is pending until a registration resolves
///
/// Cloning is cheap; every clone observes the same resolution.
pub struct Output<T> {
    inner: SharedOutput,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peek() {
            Some(Ok(v)) if v.secret => f.write_str("Output([secret])"),
            Some(Ok(v)) => write!(f, "Output({})", v.value),
            Some(Err(e)) => write!(f, "Output(error: {})", e),
            None => f.write_str("Output(<pending>)"),
        }
    }
}

impl<T> Output<T> {
    pub(crate) fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<OutputValue>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
            _marker: PhantomData,
        }
    }

    /// An already-resolved output
    pub fn ready(value: OutputValue) -> Self {
        Self::from_future(futures::future::ready(Ok(value)))
    }

    /// Await the raw resolution
    pub async fn resolve(&self) -> Result<OutputValue> {
        self.inner.clone().await
    }

    pub async fn is_secret(&self) -> Result<bool> {
        Ok(self.resolve().await?.secret)
    }

    pub async fn dependencies(&self) -> Result<Vec<String>> {
        Ok(self.resolve().await?.dependencies)
    }

    /// Erase the value type
    pub fn untyped(&self) -> Output<Value> {
        Output {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Output<T> {
    /// Await and deserialize the value
    pub async fn get(&self) -> Result<T> {
        let resolved = self.resolve().await?;
        serde_json::from_value(resolved.value).map_err(ProviderError::from)
    }

    /// Derive a new output; secrecy and dependencies carry over
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Serialize,
        F: FnOnce(T) -> U + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        Output::from_future(async move {
            let resolved = inner.await?;
            let value: T = serde_json::from_value(resolved.value)?;
            Ok(OutputValue {
                value: serde_json::to_value(f(value))?,
                secret: resolved.secret,
                dependencies: resolved.dependencies,
            })
        })
    }
}

/// One input value
#[derive(Debug, Clone)]
pub enum Input {
    Value(Value),
    Secret(Value),
    Output(Output<Value>),
}

/// Ordered input property set
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    entries: Vec<(String, Input)>,
}

/// Inputs after all dependent outputs resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    pub values: Map<String, Value>,
    /// Input names whose value is secret
    pub secrets: Vec<String>,
    pub dependencies: Vec<String>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, name: &str, input: Input) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == name) {
            entry.1 = input;
        } else {
            self.entries.push((name.to_string(), input));
        }
        self
    }

    pub fn set(self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, Input::Value(value.into()))
    }

    pub fn set_secret(self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, Input::Secret(value.into()))
    }

    /// Reference another resource's output
    pub fn set_output<T>(self, name: &str, output: &Output<T>) -> Self {
        self.insert(name, Input::Output(output.untyped()))
    }

    pub fn set_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    /// Build from a JSON object; non-objects yield an empty set
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                entries: map.into_iter().map(|(k, v)| (k, Input::Value(v))).collect(),
            },
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Input> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Present and not a null literal; pending outputs count as present
    pub fn is_present(&self, name: &str) -> bool {
        match self.get(name) {
            None => false,
            Some(Input::Value(v)) | Some(Input::Secret(v)) => !v.is_null(),
            Some(Input::Output(_)) => true,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Await every output input and collect secrets and dependencies
    pub async fn resolve(self) -> Result<ResolvedInputs> {
        let mut resolved = ResolvedInputs::default();
        for (name, input) in self.entries {
            match input {
                Input::Value(v) => {
                    resolved.values.insert(name, v);
                },
                Input::Secret(v) => {
                    resolved.secrets.push(name.clone());
                    resolved.values.insert(name, v);
                },
                Input::Output(output) => {
                    let value = output.resolve().await?;
                    if value.secret {
                        resolved.secrets.push(name.clone());
                    }
                    for dep in value.dependencies {
                        if !resolved.dependencies.contains(&dep) {
                            resolved.dependencies.push(dep);
                        }
                    }
                    resolved.values.insert(name, value.value);
                },
            }
        }
        Ok(resolved)
    }
}

// =============================================================================
// JSON path helpers
// =============================================================================

/// Look up a dot-notation path; numeric segments index arrays, "" is the root
pub fn get_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(item);
    }
    let mut current = item;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) if current.is_array() => current.get(idx)?,
            _ => current.get(part)?,
        };
    }
    Some(current)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presence_rules() {
        let inputs = Inputs::new()
            .set("empty", "")
            .set("null", Value::Null)
            .set_secret("secret", "s");
        assert!(inputs.is_present("empty"));
        assert!(!inputs.is_present("null"));
        assert!(inputs.is_present("secret"));
        assert!(!inputs.is_present("missing"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let inputs = Inputs::new().set("a", 1).set("b", 2).set("a", 3);
        assert_eq!(inputs.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(inputs.get("a"), Some(Input::Value(v)) if v == &json!(3)));
    }

    #[test]
    fn test_set_opt_skips_none() {
        let inputs = Inputs::new().set_opt("a", None::<String>).set_opt("b", Some("x"));
        assert!(!inputs.is_present("a"));
        assert!(inputs.is_present("b"));
    }

    #[tokio::test]
    async fn test_resolve_collects_secrets_and_dependencies() {
        let upstream: Output<Value> = Output::ready(OutputValue {
            value: json!("cluster-1"),
            secret: true,
            dependencies: vec!["urn:a".to_string()],
        });
        let resolved = Inputs::new()
            .set("plain", "x")
            .set_secret("key", "k")
            .set_output("clusterId", &upstream)
            .resolve()
            .await
            .unwrap();
        assert_eq!(resolved.values.get("clusterId"), Some(&json!("cluster-1")));
        assert_eq!(resolved.secrets, vec!["key", "clusterId"]);
        assert_eq!(resolved.dependencies, vec!["urn:a"]);
    }

    #[tokio::test]
    async fn test_apply_keeps_secrecy() {
        let token: Output<String> = Output::ready(OutputValue {
            value: json!("abc"),
            secret: true,
            dependencies: vec![],
        });
        let len = token.apply(|s| s.len());
        assert_eq!(len.get().await.unwrap(), 3);
        assert!(len.is_secret().await.unwrap());
    }

    #[tokio::test]
    async fn test_get_type_mismatch_is_decode_error() {
        let out: Output<u32> = Output::ready(OutputValue::plain(json!("nope")));
        assert!(matches!(out.get().await, Err(ProviderError::Decode(_))));
    }

    #[test]
    fn test_get_path() {
        let v = json!({"eks": {"securityGroups": ["sg-1"]}, "items": [{"id": "a"}]});
        assert_eq!(get_path(&v, "eks.securityGroups.0"), Some(&json!("sg-1")));
        assert_eq!(get_path(&v, "items.0.id"), Some(&json!("a")));
        assert_eq!(get_path(&v, ""), Some(&v));
        assert_eq!(get_path(&v, "nope.x"), None);
    }
}
