//! Integration tests for the CAST AI provider using wiremock
//!
//! These tests drive `CastAiProvider` against mocked endpoints and check the
//! requests it renders from the schema mappings and how it handles the
//! responses.

use castai_provider::config::ProviderConfig;
use castai_provider::provider::{CastAiProvider, ProviderService};
use castai_provider::resource::{EksCluster, Inputs, ResourceOptions};
use castai_provider::runtime::LocalMonitor;
use castai_provider::ProviderError;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use wiremock::matchers::{bearer_token, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

async fn provider_for(server: &MockServer) -> CastAiProvider {
    let provider = CastAiProvider::new();
    provider
        .configure(ProviderConfig::new(&server.uri(), Some(TOKEN)).unwrap())
        .await
        .unwrap();
    provider
}

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

mod resource_lifecycle {
    use super::*;

    /// EKS onboarding posts the rendered body, then fetches a cluster token
    #[tokio::test]
    async fn test_eks_create_renders_body_and_fetches_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters"))
            .and(bearer_token(TOKEN))
            .and(header("X-API-Key", TOKEN))
            .and(body_json(json!({
                "name": "prod",
                "eks": {
                    "accountId": "123456789012",
                    "region": "us-east-1",
                    "clusterName": "prod",
                    "subnets": ["subnet-1", "subnet-2"]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cluster-1",
                "credentialsId": "cred-1",
                "eks": {"securityGroups": ["sg-1"]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/cluster-1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "agent-secret"})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let created = provider
            .create(
                "castai:aws:EksCluster",
                &obj(json!({
                    "name": "prod",
                    "accountId": "123456789012",
                    "region": "us-east-1",
                    "subnets": ["subnet-1", "subnet-2"],
                    "deleteNodesOnDisconnect": false
                })),
            )
            .await
            .unwrap();

        assert_eq!(created.id, "cluster-1");
        assert_eq!(created.outputs["credentialsId"], "cred-1");
        assert_eq!(created.outputs["securityGroups"], json!(["sg-1"]));
        assert_eq!(created.outputs["clusterToken"], "agent-secret");
        assert_eq!(created.outputs["agentToken"], "agent-secret");
        assert_eq!(created.outputs["region"], "us-east-1");
    }

    /// Remote rejections carry the backend body unchanged
    #[tokio::test]
    async fn test_api_error_body_is_verbatim() {
        let server = MockServer::start().await;
        let body = r#"{"message":"invalid region","fieldViolations":[{"field":"eks.region"}]}"#;

        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters"))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .create(
                "castai:aws:EksCluster",
                &obj(json!({"accountId": "1", "region": "nowhere"})),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::Api {
                status: 400,
                message: body.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_read_of_deleted_cluster_returns_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/clusters/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let read = provider
            .read("castai:gcp:GkeCluster", "gone", &Map::new())
            .await
            .unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_read_propagates_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/clusters/c1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .read("castai:gcp:GkeCluster", "c1", &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    /// Deleting an EKS cluster disconnects it first, then removes it
    #[tokio::test]
    async fn test_eks_delete_disconnects_then_deletes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters/cluster-1/disconnect"))
            .and(body_json(json!({
                "deleteProvisionedNodes": true,
                "keepKubernetesResources": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1/kubernetes/external-clusters/cluster-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        provider
            .delete(
                "castai:aws:EksCluster",
                "cluster-1",
                &obj(json!({"deleteNodesOnDisconnect": true})),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_gke_update_patches_cluster() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/kubernetes/clusters/c1"))
            .and(body_json(json!({"deleteNodesOnDisconnect": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1"})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let outputs = provider
            .update(
                "castai:gcp:GkeCluster",
                "c1",
                &obj(json!({"projectId": "p", "location": "l", "clusterToken": "t"})),
                &obj(json!({"projectId": "p", "location": "l", "deleteNodesOnDisconnect": true})),
            )
            .await
            .unwrap();
        assert_eq!(outputs["clusterToken"], "t");
        assert_eq!(outputs["deleteNodesOnDisconnect"], true);
    }

    /// Full path: typed binding, local host, provider, mocked API
    #[tokio::test]
    async fn test_eks_binding_through_local_host() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/external-clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-42"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/kubernetes/clusters/c-42/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-42"})))
            .mount(&server)
            .await;

        let provider = Arc::new(provider_for(&server).await);
        let monitor = LocalMonitor::new(provider, "infra", "prod");
        let cluster = EksCluster::new(
            &monitor.context(),
            "production-eks-cluster",
            Inputs::new()
                .set("accountId", "123456789012")
                .set("region", "us-west-2"),
            ResourceOptions::default(),
        )
        .unwrap();

        assert_eq!(cluster.id().get().await.unwrap(), "c-42");
        let token = cluster.cluster_token();
        assert!(token.is_secret().await.unwrap());
        assert_eq!(token.get().await.unwrap().as_deref(), Some("tok-42"));

        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot.resources[0].outputs["clusterToken"], "[secret]");
    }
}

mod data_sources {
    use super::*;

    #[tokio::test]
    async fn test_get_organization_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/organizations"))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [
                    {"id": "org-1", "name": "staging"},
                    {"id": "org-2", "name": "acme"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .invoke(
                "castai:organization:GetOrganizationDataSource",
                &obj(json!({"name": "acme"})),
            )
            .await
            .unwrap();
        assert_eq!(result["id"], "org-2");
        assert_eq!(result["name"], "acme");
    }

    #[tokio::test]
    async fn test_lookup_without_match_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/cloud-credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "cred-1", "name": "aws-main", "cloud": "aws"}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .invoke(
                "castai:index:GetCredentialsDataSource",
                &obj(json!({"name": "gcp-main"})),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let found = provider
            .invoke(
                "castai:index:GetCredentialsDataSource",
                &obj(json!({"id": "cred-1"})),
            )
            .await
            .unwrap();
        assert_eq!(found["cloud"], "aws");
    }

    #[tokio::test]
    async fn test_lookup_requires_a_match_argument() {
        let server = MockServer::start().await;
        let provider = provider_for(&server).await;

        let err = provider
            .invoke("castai:index:GetCredentialsDataSource", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidProperty { .. }));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_get_cluster_maps_nested_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/kubernetes/clusters/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1",
                "name": "prod",
                "status": "ready",
                "region": {"name": "eu-central-1"}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .invoke("castai:index:GetClusterDataSource", &obj(json!({"id": "c1"})))
            .await
            .unwrap();
        assert_eq!(result["region"], "eu-central-1");
        assert_eq!(result["status"], "ready");
        assert_eq!(result["id"], "c1");
    }
}
