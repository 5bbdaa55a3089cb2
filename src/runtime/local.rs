//! In-process hosting runtime
//!
//! [`LocalMonitor`] forwards registrations to a [`ProviderService`], keeps
//! the resulting resource graph in memory, and can serialize it as a state
//! snapshot with secret values redacted.

use super::{
    make_urn, Context, InvokeRequest, ReadResourceRequest, ReadResourceResponse,
    RegisterResourceRequest, RegisterResourceResponse, ResourceMonitor,
};
use crate::error::{ProviderError, Result};
use crate::provider::{DiffResult, ProviderService};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const REDACTED: &str = "[secret]";

/// One resource known to the local host
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub urn: String,
    pub type_token: String,
    pub name: String,
    pub id: String,
    pub inputs: Map<String, Value>,
    pub outputs: Map<String, Value>,
    pub secrets: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Serializable view of the resource graph
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub project: String,
    pub stack: String,
    pub timestamp: DateTime<Utc>,
    pub resources: Vec<SnapshotResource>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResource {
    pub urn: String,
    #[serde(rename = "type")]
    pub type_token: String,
    pub id: String,
    pub outputs: Map<String, Value>,
    pub dependencies: Vec<String>,
}

/// Replace secret values, keeping keys
pub fn redact(outputs: &Map<String, Value>, secrets: &[String]) -> Map<String, Value> {
    outputs
        .iter()
        .map(|(k, v)| {
            if secrets.contains(k) && !v.is_null() {
                (k.clone(), Value::String(REDACTED.to_string()))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// In-process host backed by a provider
pub struct LocalMonitor {
    provider: Arc<dyn ProviderService>,
    project: String,
    stack: String,
    resources: RwLock<Vec<ResourceEntry>>,
}

impl LocalMonitor {
    pub fn new(provider: Arc<dyn ProviderService>, project: &str, stack: &str) -> Arc<Self> {
        Arc::new(Self {
            provider,
            project: project.to_string(),
            stack: stack.to_string(),
            resources: RwLock::new(Vec::new()),
        })
    }

    pub fn context(self: &Arc<Self>) -> Context {
        Context::new(self.clone(), &self.project, &self.stack)
    }

    pub fn provider(&self) -> &Arc<dyn ProviderService> {
        &self.provider
    }

    async fn store(&self, entry: ResourceEntry) {
        let mut resources = self.resources.write().await;
        match resources.iter_mut().find(|r| r.urn == entry.urn) {
            Some(existing) => *existing = entry,
            None => resources.push(entry),
        }
    }

    async fn forget(&self, urn: &str) {
        self.resources.write().await.retain(|r| r.urn != urn);
    }

    pub async fn resource(&self, urn: &str) -> Option<ResourceEntry> {
        self.resources
            .read()
            .await
            .iter()
            .find(|r| r.urn == urn)
            .cloned()
    }

    pub async fn resources(&self) -> Vec<ResourceEntry> {
        self.resources.read().await.clone()
    }

    /// Apply new inputs to a registered resource: update in place, or
    /// delete and recreate when a replace-only property changed
    pub async fn update(&self, urn: &str, news: Map<String, Value>) -> Result<DiffResult> {
        let entry = self
            .resource(urn)
            .await
            .ok_or_else(|| ProviderError::NotFound(urn.to_string()))?;
        let token = entry.type_token.as_str();
        let news = self.provider.check(token, &news).await?.into_result(token)?;
        let diff = self.provider.diff(token, &entry.id, &entry.inputs, &news).await?;

        if !diff.has_changes() {
            return Ok(diff);
        }

        let (id, outputs) = if diff.requires_replace() {
            tracing::info!("Replacing {} (changed: {:?})", urn, diff.replaces);
            self.provider.delete(token, &entry.id, &entry.outputs).await?;
            let created = match self.provider.create(token, &news).await {
                Ok(created) => created,
                Err(e) => {
                    // The old object is gone; keep no entry pointing at it
                    tracing::warn!("Recreating {} failed after delete: {}", urn, e);
                    self.forget(urn).await;
                    return Err(e);
                },
            };
            (created.id, created.outputs)
        } else {
            let outputs = self
                .provider
                .update(token, &entry.id, &entry.outputs, &news)
                .await?;
            (entry.id.clone(), outputs)
        };

        self.store(ResourceEntry {
            id,
            inputs: news,
            outputs,
            ..entry
        })
        .await;
        Ok(diff)
    }

    /// Delete a registered resource and drop it from the graph
    pub async fn delete(&self, urn: &str) -> Result<()> {
        let entry = self
            .resource(urn)
            .await
            .ok_or_else(|| ProviderError::NotFound(urn.to_string()))?;
        self.provider
            .delete(&entry.type_token, &entry.id, &entry.outputs)
            .await?;
        self.forget(urn).await;
        Ok(())
    }

    /// Delete everything, most recently registered first
    pub async fn destroy_all(&self) -> Result<usize> {
        let urns: Vec<String> = self
            .resources()
            .await
            .into_iter()
            .rev()
            .map(|r| r.urn)
            .collect();
        for urn in &urns {
            self.delete(urn).await?;
        }
        Ok(urns.len())
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let resources = self
            .resources
            .read()
            .await
            .iter()
            .map(|r| SnapshotResource {
                urn: r.urn.clone(),
                type_token: r.type_token.clone(),
                id: r.id.clone(),
                outputs: redact(&r.outputs, &r.secrets),
                dependencies: r.dependencies.clone(),
            })
            .collect();
        StateSnapshot {
            project: self.project.clone(),
            stack: self.stack.clone(),
            timestamp: Utc::now(),
            resources,
        }
    }
}

#[async_trait]
impl ResourceMonitor for LocalMonitor {
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse> {
        let token = request.type_token.as_str();
        let urn = make_urn(&self.stack, &self.project, token, &request.name);

        let (id, inputs, outputs) = match &request.import_id {
            Some(id) => {
                let read = self
                    .provider
                    .read(token, id, &request.inputs)
                    .await?
                    .ok_or_else(|| ProviderError::NotFound(format!("{} {}", token, id)))?;
                (read.id, request.inputs.clone(), read.outputs)
            },
            None => {
                let inputs = self
                    .provider
                    .check(token, &request.inputs)
                    .await?
                    .into_result(token)?;
                let created = self.provider.create(token, &inputs).await?;
                (created.id, inputs, created.outputs)
            },
        };

        self.store(ResourceEntry {
            urn: urn.clone(),
            type_token: request.type_token.clone(),
            name: request.name.clone(),
            id: id.clone(),
            inputs,
            outputs: outputs.clone(),
            secrets: request.additional_secret_outputs.clone(),
            dependencies: request.dependencies.clone(),
        })
        .await;

        Ok(RegisterResourceResponse { urn, id, outputs })
    }

    async fn read_resource(&self, request: ReadResourceRequest) -> Result<ReadResourceResponse> {
        let token = request.type_token.as_str();
        let urn = make_urn(&self.stack, &self.project, token, &request.name);
        let read = self
            .provider
            .read(token, &request.id, &request.state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} {}", token, request.id)))?;

        self.store(ResourceEntry {
            urn: urn.clone(),
            type_token: request.type_token.clone(),
            name: request.name.clone(),
            id: read.id,
            inputs: request.state.clone(),
            outputs: read.outputs.clone(),
            secrets: request.additional_secret_outputs.clone(),
            dependencies: request.dependencies.clone(),
        })
        .await;

        Ok(ReadResourceResponse {
            urn,
            outputs: read.outputs,
        })
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<Map<String, Value>> {
        self.provider.invoke(&request.token, &request.args).await
    }
}
