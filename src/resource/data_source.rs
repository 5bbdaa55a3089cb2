//! Data source invocation
//!
//! Data sources are stateless queries. Required arguments are validated
//! locally with the same error as resource construction; not-found is an
//! error, never an empty result.

use super::property::Inputs;
use super::registry::get_data_source_schema;
use crate::error::{ProviderError, Result};
use crate::runtime::{Context, InvokeRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Invoke a data source by token and return its raw result
pub async fn invoke(ctx: &Context, token: &str, args: Inputs) -> Result<Map<String, Value>> {
    let schema =
        get_data_source_schema(token).ok_or_else(|| ProviderError::UnknownType(token.to_string()))?;

    if let Some(missing) = schema
        .required_args()
        .into_iter()
        .find(|arg| !args.is_present(arg))
    {
        return Err(ProviderError::missing(token, missing));
    }

    let resolved = args.resolve().await?;
    tracing::debug!("Invoking {}", token);
    ctx.monitor()
        .invoke(InvokeRequest {
            token: token.to_string(),
            args: resolved.values,
        })
        .await
}

/// Invoke with serializable arguments and deserialize the result
pub async fn invoke_typed<A, R>(ctx: &Context, token: &str, args: &A) -> Result<R>
where
    A: Serialize,
    R: DeserializeOwned,
{
    let args = Inputs::from_value(serde_json::to_value(args)?);
    let result = invoke(ctx, token, args).await?;
    serde_json::from_value(Value::Object(result)).map_err(ProviderError::from)
}

// =============================================================================
// Typed data sources
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GetOrganizationArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetOrganizationResult {
    pub id: String,
    pub name: String,
}

/// Look up an organization by name
pub async fn get_organization(
    ctx: &Context,
    args: &GetOrganizationArgs,
) -> Result<GetOrganizationResult> {
    invoke_typed(ctx, "castai:organization:GetOrganizationDataSource", args).await
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetCredentialsArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetCredentialsResult {
    pub cloud: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn get_credentials(
    ctx: &Context,
    args: &GetCredentialsArgs,
) -> Result<GetCredentialsResult> {
    invoke_typed(ctx, "castai:index:GetCredentialsDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkloadScalingPolicyOrderArgs {
    pub cluster_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkloadScalingPolicyOrderResult {
    pub id: String,
    pub cluster_id: String,
    #[serde(default)]
    pub policy_ids: Vec<String>,
}

pub async fn get_workload_scaling_policy_order(
    ctx: &Context,
    args: &GetWorkloadScalingPolicyOrderArgs,
) -> Result<GetWorkloadScalingPolicyOrderResult> {
    invoke_typed(ctx, "castai:workload:GetWorkloadScalingPolicyOrderDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
pub struct GetClusterArgs {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetClusterResult {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub autoscaler_policies: Vec<Value>,
    #[serde(default)]
    pub kubeconfigs: Vec<Value>,
}

pub async fn get_cluster(ctx: &Context, args: &GetClusterArgs) -> Result<GetClusterResult> {
    invoke_typed(ctx, "castai:index:GetClusterDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksSettingsArgs {
    pub account_id: String,
    pub region: String,
    pub vpc: String,
    pub cluster: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksSettingsResult {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub vpc: String,
    pub cluster: String,
    pub iam_managed_policies: Vec<String>,
    pub iam_policy_json: String,
    pub iam_user_policy_json: String,
}

pub async fn get_eks_settings(
    ctx: &Context,
    args: &GetEksSettingsArgs,
) -> Result<GetEksSettingsResult> {
    invoke_typed(ctx, "castai:aws:GetEksSettingsDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksUserArnArgs {
    pub cluster_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksUserArnResult {
    pub id: String,
    pub cluster_id: String,
    pub arn: String,
}

pub async fn get_eks_user_arn(
    ctx: &Context,
    args: &GetEksUserArnArgs,
) -> Result<GetEksUserArnResult> {
    invoke_typed(ctx, "castai:aws:GetEksUserArnDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksClusterIdArgs {
    pub account_id: String,
    pub region: String,
    pub cluster_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEksClusterIdResult {
    pub id: String,
    pub account_id: String,
    pub region: String,
    pub cluster_name: String,
}

pub async fn get_eks_cluster_id(
    ctx: &Context,
    args: &GetEksClusterIdArgs,
) -> Result<GetEksClusterIdResult> {
    invoke_typed(ctx, "castai:aws:GetEksClusterIdDataSource", args).await
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetGkePoliciesArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetGkePoliciesResult {
    pub id: String,
    #[serde(default)]
    pub features: Option<HashMap<String, bool>>,
    pub policies: Vec<String>,
}

pub async fn get_gke_policies(
    ctx: &Context,
    args: &GetGkePoliciesArgs,
) -> Result<GetGkePoliciesResult> {
    invoke_typed(ctx, "castai:gcp:GetGkePoliciesDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
pub struct GetRebalancingScheduleArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRebalancingScheduleResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub launch_configurations: Vec<Value>,
    #[serde(default)]
    pub schedules: Vec<Value>,
    #[serde(default)]
    pub trigger_conditions: Vec<Value>,
}

pub async fn get_rebalancing_schedule(
    ctx: &Context,
    args: &GetRebalancingScheduleArgs,
) -> Result<GetRebalancingScheduleResult> {
    invoke_typed(ctx, "castai:rebalancing:GetRebalancingScheduleDataSource", args).await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHibernationScheduleArgs {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHibernationScheduleResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cluster_assignments: Vec<Value>,
    #[serde(default)]
    pub pause_configs: Vec<Value>,
    #[serde(default)]
    pub resume_configs: Vec<Value>,
}

pub async fn get_hibernation_schedule(
    ctx: &Context,
    args: &GetHibernationScheduleArgs,
) -> Result<GetHibernationScheduleResult> {
    invoke_typed(ctx, "castai:rebalancing:GetHibernationScheduleDataSource", args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CastAiMocks, MockMonitor};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_required_arg_issues_no_call() {
        let monitor = MockMonitor::new(Arc::new(CastAiMocks::new()));
        let ctx = monitor.context();
        let err = invoke(&ctx, "castai:organization:GetOrganizationDataSource", Inputs::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required property 'name'");
        assert_eq!(monitor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_result() {
        let mocks = CastAiMocks::new().with_call_result(
            "castai:workload:GetWorkloadScalingPolicyOrderDataSource",
            json!({"id": "c1", "clusterId": "c1", "policyIds": ["p2", "p1"]}),
        );
        let monitor = MockMonitor::new(Arc::new(mocks));
        let ctx = monitor.context();
        let order = get_workload_scaling_policy_order(
            &ctx,
            &GetWorkloadScalingPolicyOrderArgs {
                cluster_id: "c1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(order.policy_ids, vec!["p2", "p1"]);
        assert_eq!(monitor.invocations()[0].args["clusterId"], json!("c1"));
    }

    #[tokio::test]
    async fn test_optional_args_are_omitted() {
        let mocks = CastAiMocks::new().with_call_result(
            "castai:index:GetCredentialsDataSource",
            json!({"cloud": "aws", "name": "prod"}),
        );
        let monitor = MockMonitor::new(Arc::new(mocks));
        let creds = get_credentials(
            &monitor.context(),
            &GetCredentialsArgs {
                id: None,
                name: Some("prod".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(creds.cloud, "aws");
        assert!(!monitor.invocations()[0].args.contains_key("id"));
    }

    #[tokio::test]
    async fn test_unknown_data_source() {
        let ctx = MockMonitor::new(Arc::new(CastAiMocks::new())).context();
        let err = invoke(&ctx, "castai:index:GetNothingDataSource", Inputs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownType(_)));
    }
}
