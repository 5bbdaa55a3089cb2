//! Hosting runtime seam
//!
//! Resource bindings never talk to the backend directly. They hand
//! registration, read and invoke requests to a [`ResourceMonitor`], which is
//! either the in-process [`local::LocalMonitor`] that drives a provider, or
//! the [`mock::MockMonitor`] used in tests.
//!
//! # Module Structure
//!
//! - [`local`] - In-process host backed by a [`ProviderService`](crate::provider::ProviderService)
//! - [`mock`] - Mock host with call recording and deterministic IDs

pub mod local;
pub mod mock;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub use local::{LocalMonitor, StateSnapshot};
pub use mock::{mock_hash, CastAiMocks, MockCall, MockMonitor, Mocks};

/// Request to create (or import) a custom resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResourceRequest {
    #[serde(rename = "type")]
    pub type_token: String,
    pub name: String,
    pub custom: bool,
    pub inputs: Map<String, Value>,
    /// URNs this resource's inputs were derived from
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub additional_secret_outputs: Vec<String>,
    /// Existing backend ID to adopt instead of creating
    #[serde(default)]
    pub import_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResourceResponse {
    pub urn: String,
    pub id: String,
    pub outputs: Map<String, Value>,
}

/// Request to adopt an existing resource by ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResourceRequest {
    #[serde(rename = "type")]
    pub type_token: String,
    pub name: String,
    pub id: String,
    /// Known state used to seed the read
    pub state: Map<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub additional_secret_outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResponse {
    pub urn: String,
    pub outputs: Map<String, Value>,
}

/// Data source invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub token: String,
    pub args: Map<String, Value>,
}

/// The host the binding engine registers resources with
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse>;

    async fn read_resource(&self, request: ReadResourceRequest) -> Result<ReadResourceResponse>;

    async fn invoke(&self, request: InvokeRequest) -> Result<Map<String, Value>>;
}

/// Build `urn:pulumi:<stack>::<project>::<type>::<name>`
pub fn make_urn(stack: &str, project: &str, type_token: &str, name: &str) -> String {
    format!("urn:pulumi:{}::{}::{}::{}", stack, project, type_token, name)
}

/// Per-program context handed to every resource constructor
#[derive(Clone)]
pub struct Context {
    monitor: Arc<dyn ResourceMonitor>,
    project: String,
    stack: String,
}

impl Context {
    pub fn new(monitor: Arc<dyn ResourceMonitor>, project: &str, stack: &str) -> Self {
        Self {
            monitor,
            project: project.to_string(),
            stack: stack.to_string(),
        }
    }

    pub fn monitor(&self) -> &Arc<dyn ResourceMonitor> {
        &self.monitor
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn urn(&self, type_token: &str, name: &str) -> String {
        make_urn(&self.stack, &self.project, type_token, name)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("project", &self.project)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}
