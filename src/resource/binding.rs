//! Generic resource binding
//!
//! [`CustomResource`] implements Create / Lookup / IsInstance for every type
//! in the schema registry. Construction validates required inputs
//! synchronously and fails before the monitor sees anything; registration
//! itself is spawned eagerly and exposed through shared [`Output`]s.

use super::property::{Inputs, Output, OutputValue};
use super::registry::{get_resource_schema, ResourceSchema};
use crate::error::{ProviderError, Result};
use crate::runtime::{Context, ReadResourceRequest, RegisterResourceRequest, ResourceMonitor};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Options accepted by resource constructors
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Adopt the backend object with this ID instead of creating one
    pub import_id: Option<String>,
    /// Extra outputs to mark secret beyond the schema's secret properties
    pub additional_secret_outputs: Vec<String>,
    /// Explicit dependencies (URNs)
    pub depends_on: Vec<String>,
}

impl ResourceOptions {
    pub fn import(id: &str) -> Self {
        Self {
            import_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    /// Whether this construction adopts an existing resource
    fn is_adoption(&self) -> bool {
        self.import_id.is_some()
    }
}

/// Anything that carries a stable type token
pub trait HasTypeToken {
    fn type_token(&self) -> &str;
}

impl HasTypeToken for str {
    fn type_token(&self) -> &str {
        self
    }
}

impl HasTypeToken for String {
    fn type_token(&self) -> &str {
        self
    }
}

impl<T: HasTypeToken + ?Sized> HasTypeToken for &T {
    fn type_token(&self) -> &str {
        (**self).type_token()
    }
}

/// Whether `candidate` is of the type identified by `token`
pub fn is_instance_of<C: HasTypeToken + ?Sized>(token: &str, candidate: &C) -> bool {
    candidate.type_token() == token
}

/// Result of a completed registration
#[derive(Debug)]
struct Registered {
    urn: String,
    id: String,
    outputs: Map<String, Value>,
    secrets: Vec<String>,
}

type SharedRegistration = Shared<BoxFuture<'static, Result<Arc<Registered>>>>;

/// A registered custom resource of any schema type
#[derive(Clone)]
pub struct CustomResource {
    type_token: String,
    name: String,
    registration: SharedRegistration,
}

impl fmt::Debug for CustomResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomResource")
            .field("type", &self.type_token)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl HasTypeToken for CustomResource {
    fn type_token(&self) -> &str {
        &self.type_token
    }
}

fn lookup_schema(token: &str) -> Result<&'static ResourceSchema> {
    get_resource_schema(token).ok_or_else(|| ProviderError::UnknownType(token.to_string()))
}

/// Schema secrets plus caller-requested ones, without duplicates
fn secret_outputs(schema: &ResourceSchema, extra: &[String]) -> Vec<String> {
    let mut secrets = schema.secret_outputs();
    for name in extra {
        if !secrets.contains(name) {
            secrets.push(name.clone());
        }
    }
    secrets
}

/// Start the registration on the current runtime if there is one,
/// otherwise it runs on first await
fn spawn_registration<F>(future: F) -> SharedRegistration
where
    F: Future<Output = Result<Arc<Registered>>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let task = handle.spawn(future);
            async move {
                task.await
                    .map_err(|e| ProviderError::Registration(e.to_string()))?
            }
            .boxed()
            .shared()
        },
        Err(_) => future.boxed().shared(),
    }
}

impl CustomResource {
    /// Create (or import) a resource.
    ///
    /// Unless adopting, every required input must be present and not null;
    /// otherwise this fails with `MissingRequiredProperty` and no monitor call
    /// is issued.
    pub fn new(
        ctx: &Context,
        type_token: &str,
        name: &str,
        inputs: Inputs,
        opts: ResourceOptions,
    ) -> Result<Self> {
        let schema = lookup_schema(type_token)?;

        if !opts.is_adoption() {
            if let Some(missing) = schema
                .required_inputs()
                .into_iter()
                .find(|prop| !inputs.is_present(prop))
            {
                return Err(ProviderError::missing(type_token, missing));
            }
        }

        let secrets = secret_outputs(schema, &opts.additional_secret_outputs);
        let monitor: Arc<dyn ResourceMonitor> = ctx.monitor().clone();
        let token = schema.token.clone();
        let resource_name = name.to_string();

        tracing::info!("Registering {} '{}'", token, name);

        let registration = spawn_registration(async move {
            let resolved = inputs.resolve().await?;
            let mut dependencies = resolved.dependencies;
            for dep in opts.depends_on {
                if !dependencies.contains(&dep) {
                    dependencies.push(dep);
                }
            }

            // Outputs fed by secret inputs stay secret
            let mut all_secrets = secrets;
            for name in resolved.secrets {
                if !all_secrets.contains(&name) {
                    all_secrets.push(name);
                }
            }

            let response = monitor
                .register_resource(RegisterResourceRequest {
                    type_token: token.clone(),
                    name: resource_name.clone(),
                    custom: true,
                    inputs: resolved.values,
                    dependencies,
                    additional_secret_outputs: all_secrets.clone(),
                    import_id: opts.import_id,
                })
                .await
                .map_err(|e| {
                    tracing::warn!("Registration of {} '{}' failed: {}", token, resource_name, e);
                    e
                })?;

            Ok(Arc::new(Registered {
                urn: response.urn,
                id: response.id,
                outputs: response.outputs,
                secrets: all_secrets,
            }))
        });

        Ok(Self {
            type_token: type_token.to_string(),
            name: name.to_string(),
            registration,
        })
    }

    /// Adopt an existing resource by ID. Required inputs are not validated;
    /// `state` seeds the known inputs.
    pub fn get(
        ctx: &Context,
        type_token: &str,
        name: &str,
        id: &str,
        state: Option<Inputs>,
    ) -> Result<Self> {
        let schema = lookup_schema(type_token)?;
        let secrets = schema.secret_outputs();
        let monitor: Arc<dyn ResourceMonitor> = ctx.monitor().clone();
        let token = schema.token.clone();
        let resource_name = name.to_string();
        let resource_id = id.to_string();
        let state = state.unwrap_or_default();

        tracing::info!("Reading {} '{}' ({})", token, name, id);

        let registration = spawn_registration(async move {
            let resolved = state.resolve().await?;
            let response = monitor
                .read_resource(ReadResourceRequest {
                    type_token: token,
                    name: resource_name,
                    id: resource_id.clone(),
                    state: resolved.values,
                    dependencies: resolved.dependencies,
                    additional_secret_outputs: secrets.clone(),
                })
                .await?;

            let mut all_secrets = secrets;
            for name in resolved.secrets {
                if !all_secrets.contains(&name) {
                    all_secrets.push(name);
                }
            }

            Ok(Arc::new(Registered {
                urn: response.urn,
                id: resource_id,
                outputs: response.outputs,
                secrets: all_secrets,
            }))
        });

        Ok(Self {
            type_token: type_token.to_string(),
            name: name.to_string(),
            registration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn urn(&self) -> Output<String> {
        let registration = self.registration.clone();
        Output::from_future(async move {
            let registered = registration.await?;
            Ok(OutputValue::plain(Value::String(registered.urn.clone())))
        })
    }

    /// Backend ID; stable once assigned
    pub fn id(&self) -> Output<String> {
        let registration = self.registration.clone();
        Output::from_future(async move {
            let registered = registration.await?;
            Ok(OutputValue {
                value: Value::String(registered.id.clone()),
                secret: false,
                dependencies: vec![registered.urn.clone()],
            })
        })
    }

    /// A single output property; `null` when the backend did not return it
    pub fn output<T: DeserializeOwned>(&self, property: &str) -> Output<T> {
        let registration = self.registration.clone();
        let property = property.to_string();
        Output::from_future(async move {
            let registered = registration.await?;
            Ok(OutputValue {
                value: registered
                    .outputs
                    .get(&property)
                    .cloned()
                    .unwrap_or(Value::Null),
                secret: registered.secrets.contains(&property),
                dependencies: vec![registered.urn.clone()],
            })
        })
    }

    /// The whole output record
    pub fn outputs(&self) -> Output<Map<String, Value>> {
        let registration = self.registration.clone();
        Output::from_future(async move {
            let registered = registration.await?;
            Ok(OutputValue {
                value: Value::Object(registered.outputs.clone()),
                secret: false,
                dependencies: vec![registered.urn.clone()],
            })
        })
    }

    /// Names of outputs resolved as secret
    pub async fn secret_outputs(&self) -> Result<Vec<String>> {
        Ok(self.registration.clone().await?.secrets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CastAiMocks, MockMonitor};
    use serde_json::json;

    fn monitor() -> Arc<MockMonitor> {
        MockMonitor::new(Arc::new(CastAiMocks::new()))
    }

    #[tokio::test]
    async fn test_missing_required_fails_before_monitor_call() {
        let monitor = monitor();
        let ctx = monitor.context();
        let err = CustomResource::new(
            &ctx,
            "castai:aws:EksCluster",
            "c",
            Inputs::new().set("accountId", "123"),
            ResourceOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing required property 'region'");
        tokio::task::yield_now().await;
        assert_eq!(monitor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_null_counts_as_absent_empty_string_present() {
        let ctx = monitor().context();
        let null = CustomResource::new(
            &ctx,
            "castai:index:ClusterToken",
            "t",
            Inputs::new().set("clusterId", Value::Null),
            ResourceOptions::default(),
        );
        assert!(matches!(null, Err(ProviderError::MissingRequiredProperty { .. })));

        let empty = CustomResource::new(
            &ctx,
            "castai:index:ClusterToken",
            "t",
            Inputs::new().set("clusterId", ""),
            ResourceOptions::default(),
        );
        assert!(empty.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let ctx = monitor().context();
        let err = CustomResource::new(&ctx, "castai:aws:Nope", "x", Inputs::new(), Default::default())
            .unwrap_err();
        assert_eq!(err, ProviderError::UnknownType("castai:aws:Nope".into()));
    }

    #[tokio::test]
    async fn test_import_skips_validation() {
        let monitor = monitor();
        let ctx = monitor.context();
        let resource = CustomResource::new(
            &ctx,
            "castai:aws:EksCluster",
            "adopted",
            Inputs::new(),
            ResourceOptions::import("cluster-123"),
        )
        .unwrap();
        assert_eq!(resource.id().get().await.unwrap(), "cluster-123");
        assert_eq!(
            monitor.registrations()[0].import_id.as_deref(),
            Some("cluster-123")
        );
    }

    #[tokio::test]
    async fn test_only_import_id_skips_validation() {
        let monitor = monitor();
        let opts = ResourceOptions {
            additional_secret_outputs: vec!["credentialsId".into()],
            depends_on: vec!["urn:pulumi:stack::project::castai:aws:EksCluster::other".into()],
            ..Default::default()
        };
        let err = CustomResource::new(&monitor.context(), "castai:aws:EksCluster", "x", Inputs::new(), opts)
            .unwrap_err();
        assert_eq!(err, ProviderError::missing("castai:aws:EksCluster", "accountId"));
        tokio::task::yield_now().await;
        assert_eq!(monitor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_secret_outputs_marked() {
        let ctx = monitor().context();
        let resource = CustomResource::new(
            &ctx,
            "castai:gcp:GkeCluster",
            "gke",
            Inputs::new().set("location", "us-central1").set("projectId", "p"),
            ResourceOptions::default(),
        )
        .unwrap();
        let token = resource.output::<String>("clusterToken");
        assert!(token.get().await.unwrap().starts_with("mock-gke-token-"));
        assert!(token.is_secret().await.unwrap());
        assert!(!resource.output::<String>("location").is_secret().await.unwrap());
    }

    #[tokio::test]
    async fn test_output_dependency_is_forwarded() {
        let monitor = monitor();
        let ctx = monitor.context();
        let cluster = CustomResource::new(
            &ctx,
            "castai:aws:EksCluster",
            "eks",
            Inputs::new().set("accountId", "1").set("region", "eu-west-1"),
            ResourceOptions::default(),
        )
        .unwrap();
        let token = CustomResource::new(
            &ctx,
            "castai:index:ClusterToken",
            "token",
            Inputs::new().set_output("clusterId", &cluster.id()),
            ResourceOptions::default(),
        )
        .unwrap();
        let cluster_id = token.output::<String>("clusterId").get().await.unwrap();
        assert_eq!(cluster_id, cluster.id().get().await.unwrap());

        let registrations = monitor.registrations();
        let token_request = registrations
            .iter()
            .find(|r| r.type_token == "castai:index:ClusterToken")
            .unwrap();
        assert_eq!(
            token_request.dependencies,
            vec!["urn:pulumi:stack::project::castai:aws:EksCluster::eks".to_string()]
        );
        assert_eq!(token_request.inputs["clusterId"], json!(cluster_id));
    }

    #[test]
    fn test_is_instance_of_compares_tokens() {
        assert!(is_instance_of("castai:aws:EksCluster", "castai:aws:EksCluster"));
        assert!(!is_instance_of("castai:aws:EksCluster", "castai:gcp:GkeCluster"));
    }
}
