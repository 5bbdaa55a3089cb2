//! Typed resource façades
//!
//! Each registered type gets a named wrapper around [`CustomResource`] with
//! its token as `TYPE`, plus typed accessors for its commonly used outputs.
//! Everything else is reachable through `Deref` and
//! [`CustomResource::output`].

use super::binding::{is_instance_of, CustomResource, HasTypeToken, ResourceOptions};
use super::property::{Inputs, Output};
use crate::error::Result;
use crate::runtime::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;

macro_rules! custom_resources {
    ($(
        $(#[$meta:meta])*
        $name:ident => $token:literal {
            $( $getter:ident : $ty:ty = $prop:literal ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone)]
            pub struct $name(CustomResource);

            impl $name {
                pub const TYPE: &'static str = $token;

                pub fn new(
                    ctx: &Context,
                    name: &str,
                    inputs: Inputs,
                    opts: ResourceOptions,
                ) -> Result<Self> {
                    CustomResource::new(ctx, Self::TYPE, name, inputs, opts).map(Self)
                }

                /// Adopt an existing resource by ID
                pub fn get(
                    ctx: &Context,
                    name: &str,
                    id: &str,
                    state: Option<Inputs>,
                ) -> Result<Self> {
                    CustomResource::get(ctx, Self::TYPE, name, id, state).map(Self)
                }

                pub fn is_instance<C: HasTypeToken + ?Sized>(candidate: &C) -> bool {
                    is_instance_of(Self::TYPE, candidate)
                }

                $(
                    pub fn $getter(&self) -> Output<$ty> {
                        self.0.output($prop)
                    }
                )*
            }

            impl Deref for $name {
                type Target = CustomResource;

                fn deref(&self) -> &CustomResource {
                    &self.0
                }
            }

            impl HasTypeToken for $name {
                fn type_token(&self) -> &str {
                    Self::TYPE
                }
            }

            impl From<$name> for CustomResource {
                fn from(resource: $name) -> CustomResource {
                    resource.0
                }
            }
        )*

        /// Tokens of every typed façade
        pub const ALL_TYPES: &[&str] = &[$($token),*];
    };
}

custom_resources! {
    /// Existing EKS cluster connected to CAST AI
    EksCluster => "castai:aws:EksCluster" {
        account_id: String = "accountId",
        region: String = "region",
        cluster_name: Option<String> = "name",
        agent_token: Option<String> = "agentToken",
        cluster_token: Option<String> = "clusterToken",
        credentials_id: Option<String> = "credentialsId",
        subnets: Option<Vec<String>> = "subnets",
        override_security_groups: Option<Vec<String>> = "overrideSecurityGroups",
        delete_nodes_on_disconnect: Option<bool> = "deleteNodesOnDisconnect",
    }
    EksClusterId => "castai:aws:EksClusterId" {
        account_id: String = "accountId",
        cluster_name: String = "clusterName",
        region: String = "region",
    }
    /// Existing GKE cluster connected to CAST AI
    GkeCluster => "castai:gcp:GkeCluster" {
        location: String = "location",
        project_id: String = "projectId",
        cluster_name: Option<String> = "name",
        cluster_token: Option<String> = "clusterToken",
        credentials_id: Option<String> = "credentialsId",
    }
    GkeClusterId => "castai:gcp:GkeClusterId" {
        cluster_token: Option<String> = "clusterToken",
        cast_service_account: Option<String> = "castServiceAccount",
    }
    /// Existing AKS cluster connected to CAST AI
    AksCluster => "castai:azure:AksCluster" {
        region: String = "region",
        subscription_id: String = "subscriptionId",
        cluster_name: Option<String> = "name",
        cluster_token: Option<String> = "clusterToken",
        credentials_id: Option<String> = "credentialsId",
    }
    Cluster => "castai:index:Cluster" {
        region: String = "region",
        status: Option<String> = "status",
        kubeconfigs: Option<Vec<Value>> = "kubeconfigs",
    }
    Credentials => "castai:index:Credentials" {
        cloud: Option<String> = "cloud",
    }
    ClusterToken => "castai:index:ClusterToken" {
        cluster_id: String = "clusterId",
        cluster_token: Option<String> = "clusterToken",
    }
    Commitments => "castai:index:Commitments" {}
    AllocationGroup => "castai:index:AllocationGroup" {}
    Autoscaler => "castai:autoscaling:Autoscaler" {
        cluster_id: Option<String> = "clusterId",
        autoscaler_policies: Option<String> = "autoscalerPolicies",
    }
    EvictorAdvancedConfig => "castai:autoscaling:EvictorAdvancedConfig" {}
    NodeConfiguration => "castai:nodeconfig:NodeConfiguration" {
        cluster_id: String = "clusterId",
        subnets: Vec<String> = "subnets",
    }
    NodeConfigurationDefault => "castai:nodeconfig:NodeConfigurationDefault" {
        configuration_id: String = "configurationId",
    }
    NodeTemplate => "castai:nodeconfig:NodeTemplate" {
        custom_labels: Option<HashMap<String, String>> = "customLabels",
    }
    RebalancingSchedule => "castai:rebalancing:RebalancingSchedule" {}
    RebalancingJob => "castai:rebalancing:RebalancingJob" {
        enabled: Option<bool> = "enabled",
    }
    HibernationSchedule => "castai:rebalancing:HibernationSchedule" {
        enabled: bool = "enabled",
    }
    OrganizationMembers => "castai:organization:OrganizationMembers" {}
    OrganizationGroup => "castai:organization:OrganizationGroup" {}
    SsoConnection => "castai:organization:SSOConnection" {}
    ServiceAccount => "castai:organization:ServiceAccount" {
        email: Option<String> = "email",
    }
    ServiceAccountKey => "castai:organization:ServiceAccountKey" {
        token: Option<String> = "token",
        prefix: Option<String> = "prefix",
    }
    RoleBindings => "castai:iam:RoleBindings" {}
    EnterpriseRoleBinding => "castai:iam:EnterpriseRoleBinding" {}
    WorkloadScalingPolicy => "castai:workload:WorkloadScalingPolicy" {
        apply_type: String = "applyType",
        management_option: String = "managementOption",
    }
    SecurityRuntimeRule => "castai:security:SecurityRuntimeRule" {
        is_built_in: Option<bool> = "isBuiltIn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::all_resource_tokens;
    use crate::runtime::{CastAiMocks, MockMonitor};
    use std::sync::Arc;

    #[test]
    fn test_every_registered_type_has_a_facade() {
        let mut facades: Vec<&str> = ALL_TYPES.to_vec();
        facades.sort_unstable();
        assert_eq!(facades, all_resource_tokens());
    }

    #[tokio::test]
    async fn test_is_instance_uses_token() {
        let ctx = MockMonitor::new(Arc::new(CastAiMocks::new())).context();
        let gke = GkeCluster::new(
            &ctx,
            "gke",
            Inputs::new().set("location", "europe-west1").set("projectId", "p"),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(GkeCluster::is_instance(&gke));
        assert!(!EksCluster::is_instance(&gke));
        assert!(GkeCluster::is_instance(&*gke));
        assert!(EksCluster::is_instance("castai:aws:EksCluster"));
    }

    #[tokio::test]
    async fn test_typed_accessors() {
        let ctx = MockMonitor::new(Arc::new(CastAiMocks::new())).context();
        let cluster = EksCluster::new(
            &ctx,
            "existing-eks-prod",
            Inputs::new()
                .set("accountId", "123456789012")
                .set("region", "us-east-1")
                .set("subnets", vec!["subnet-1", "subnet-2"]),
            ResourceOptions::default(),
        )
        .unwrap();
        assert_eq!(cluster.region().get().await.unwrap(), "us-east-1");
        assert_eq!(
            cluster.subnets().get().await.unwrap(),
            Some(vec!["subnet-1".to_string(), "subnet-2".to_string()])
        );
        assert_eq!(cluster.cluster_name().get().await.unwrap(), None);
        assert_eq!(
            cluster.id().get().await.unwrap(),
            "existing-eks-prod-cluster-id-889"
        );
    }
}
