//! Mock hosting runtime
//!
//! [`MockMonitor`] answers registrations from a [`Mocks`] implementation and
//! records every call so tests can assert on what reached the host (or that
//! nothing did). [`CastAiMocks`] produces deterministic IDs and tokens per
//! resource name.

use super::{
    make_urn, Context, InvokeRequest, ReadResourceRequest, ReadResourceResponse,
    RegisterResourceRequest, RegisterResourceResponse, ResourceMonitor,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Arguments of a mocked resource creation or adoption
#[derive(Debug, Clone)]
pub struct MockResourceArgs {
    pub type_token: String,
    pub name: String,
    pub inputs: Map<String, Value>,
    /// Set when adopting an existing resource
    pub id: Option<String>,
}

/// Arguments of a mocked data source call
#[derive(Debug, Clone)]
pub struct MockCallArgs {
    pub token: String,
    pub args: Map<String, Value>,
}

/// User-supplied behaviour of the mock host
#[async_trait]
pub trait Mocks: Send + Sync {
    /// Return the ID and output state of a new resource
    async fn new_resource(&self, args: MockResourceArgs) -> Result<(String, Map<String, Value>)>;

    async fn call(&self, args: MockCallArgs) -> Result<Map<String, Value>>;
}

/// A call observed by the mock host
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Register(RegisterResourceRequest),
    Read(ReadResourceRequest),
    Invoke(InvokeRequest),
}

/// Recording mock monitor
pub struct MockMonitor {
    mocks: Arc<dyn Mocks>,
    project: String,
    stack: String,
    calls: Mutex<Vec<MockCall>>,
}

impl MockMonitor {
    pub fn new(mocks: Arc<dyn Mocks>) -> Arc<Self> {
        Self::with_names(mocks, "project", "stack")
    }

    pub fn with_names(mocks: Arc<dyn Mocks>, project: &str, stack: &str) -> Arc<Self> {
        Arc::new(Self {
            mocks,
            project: project.to_string(),
            stack: stack.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A context whose resources register with this monitor
    pub fn context(self: &Arc<Self>) -> Context {
        Context::new(self.clone(), &self.project, &self.stack)
    }

    fn record(&self, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    /// Snapshot of every recorded call, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn registrations(&self) -> Vec<RegisterResourceRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Register(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<ReadResourceRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Read(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn invocations(&self) -> Vec<InvokeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Invoke(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ResourceMonitor for MockMonitor {
    async fn register_resource(
        &self,
        request: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse> {
        self.record(MockCall::Register(request.clone()));
        let urn = make_urn(&self.stack, &self.project, &request.type_token, &request.name);
        let (id, outputs) = self
            .mocks
            .new_resource(MockResourceArgs {
                type_token: request.type_token,
                name: request.name,
                inputs: request.inputs,
                id: request.import_id,
            })
            .await?;
        Ok(RegisterResourceResponse { urn, id, outputs })
    }

    async fn read_resource(&self, request: ReadResourceRequest) -> Result<ReadResourceResponse> {
        self.record(MockCall::Read(request.clone()));
        let urn = make_urn(&self.stack, &self.project, &request.type_token, &request.name);
        let (_, outputs) = self
            .mocks
            .new_resource(MockResourceArgs {
                type_token: request.type_token,
                name: request.name,
                inputs: request.state,
                id: Some(request.id),
            })
            .await?;
        Ok(ReadResourceResponse { urn, outputs })
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<Map<String, Value>> {
        self.record(MockCall::Invoke(request.clone()));
        self.mocks
            .call(MockCallArgs {
                token: request.token,
                args: request.args,
            })
            .await
    }
}

/// 32-bit string hash `h = (h << 5) - h + c` over UTF-16 units, `|h| % 1000`
pub fn mock_hash(s: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in s.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    (i64::from(hash).abs() % 1000) as u32
}

/// Deterministic mocks for CAST AI resource types
#[derive(Debug, Clone, Default)]
pub struct CastAiMocks {
    /// Results returned for data source tokens
    pub call_results: std::collections::HashMap<String, Map<String, Value>>,
}

impl CastAiMocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_result(mut self, token: &str, result: Value) -> Self {
        if let Value::Object(map) = result {
            self.call_results.insert(token.to_string(), map);
        }
        self
    }

    fn cluster_outputs(
        outputs: &mut Map<String, Value>,
        name: &str,
        cloud: &str,
    ) -> String {
        let hash = mock_hash(name);
        let id = format!("{}-cluster-id-{}", name, hash);
        let token = Value::String(format!("mock-{}-token-{}", cloud, hash));
        if cloud == "eks" {
            outputs.insert("agentToken".into(), token.clone());
        }
        outputs.insert("clusterToken".into(), token);
        outputs.insert(
            "credentialsId".into(),
            Value::String(format!("mock-credentials-{}", hash)),
        );
        id
    }
}

#[async_trait]
impl Mocks for CastAiMocks {
    async fn new_resource(&self, args: MockResourceArgs) -> Result<(String, Map<String, Value>)> {
        let mut outputs = args.inputs.clone();
        let generated = match args.type_token.as_str() {
            "castai:aws:EksCluster" => Self::cluster_outputs(&mut outputs, &args.name, "eks"),
            "castai:gcp:GkeCluster" => Self::cluster_outputs(&mut outputs, &args.name, "gke"),
            "castai:azure:AksCluster" => Self::cluster_outputs(&mut outputs, &args.name, "aks"),
            "castai:autoscaling:Autoscaler" => {
                let policies = outputs
                    .get("autoscalerPoliciesJson")
                    .cloned()
                    .unwrap_or_else(|| Value::String("{}".into()));
                outputs.insert("autoscalerPolicies".into(), policies);
                format!("{}-autoscaler-id-{}", args.name, mock_hash(&args.name))
            },
            _ => format!("{}-id", args.name),
        };
        let id = args.id.unwrap_or(generated);
        outputs.insert("id".into(), Value::String(id.clone()));
        Ok((id, outputs))
    }

    async fn call(&self, args: MockCallArgs) -> Result<Map<String, Value>> {
        Ok(self.call_results.get(&args.token).cloned().unwrap_or_default())
    }
}
