//! Locally computed data sources
//!
//! EKS settings and GKE policies are derived from their arguments alone;
//! no API call is made.

use crate::error::{ProviderError, Result};
use serde_json::{json, Map, Value};

const EKS_MANAGED_POLICIES: &[&str] = &[
    "AmazonEC2ReadOnlyAccess",
    "IAMReadOnlyAccess",
    "AmazonEventBridgeReadOnlyAccess",
];

const GKE_BASE_PERMISSIONS: &[&str] = &[
    "compute.addresses.use",
    "compute.disks.create",
    "compute.disks.get",
    "compute.disks.list",
    "compute.disks.setLabels",
    "compute.disks.use",
    "compute.images.useReadOnly",
    "compute.instanceGroupManagers.get",
    "compute.instanceGroupManagers.update",
    "compute.instanceGroups.get",
    "compute.instanceTemplates.create",
    "compute.instanceTemplates.delete",
    "compute.instanceTemplates.get",
    "compute.instanceTemplates.list",
    "compute.instances.attachDisk",
    "compute.instances.create",
    "compute.instances.delete",
    "compute.instances.get",
    "compute.instances.list",
    "compute.instances.setLabels",
    "compute.instances.setMetadata",
    "compute.instances.setServiceAccount",
    "compute.instances.start",
    "compute.instances.stop",
    "compute.networks.use",
    "compute.subnetworks.get",
    "compute.subnetworks.use",
    "compute.subnetworks.useExternalIp",
    "compute.zones.get",
    "compute.zones.list",
    "container.certificateSigningRequests.approve",
    "container.clusters.get",
    "container.clusters.update",
    "container.operations.get",
    "serviceusage.services.list",
];

const GKE_FEATURE_PERMISSIONS: &[(&str, &[&str])] = &[
    (
        "load_balancers_target_backend_pools",
        &[
            "compute.targetPools.addInstance",
            "compute.targetPools.get",
            "compute.targetPools.list",
            "compute.targetPools.removeInstance",
        ],
    ),
    (
        "load_balancers_unmanaged_instance_groups",
        &[
            "compute.instanceGroups.update",
            "compute.instanceGroups.list",
        ],
    ),
];

/// Compute a local data source result by name
pub fn compute(local: &str, args: &Map<String, Value>) -> Result<Map<String, Value>> {
    match local {
        "eks_settings" => eks_settings(args),
        "gke_policies" => gke_policies(args),
        other => Err(ProviderError::UnknownType(format!("local data source {}", other))),
    }
}

fn arg_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::missing("eks_settings", name))
}

/// ARN partition for a region
fn partition(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

fn eks_settings(args: &Map<String, Value>) -> Result<Map<String, Value>> {
    let account_id = arg_str(args, "accountId")?;
    let region = arg_str(args, "region")?;
    let vpc = arg_str(args, "vpc")?;
    let cluster = arg_str(args, "cluster")?;
    let partition = partition(region);

    let managed: Vec<String> = EKS_MANAGED_POLICIES
        .iter()
        .map(|p| format!("arn:{}:iam::aws:policy/{}", partition, p))
        .collect();

    let instance_arn = format!("arn:{}:ec2:{}:{}:instance/*", partition, region, account_id);
    let policy = json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "RunInstancesTagRestriction",
                "Effect": "Allow",
                "Action": "ec2:RunInstances",
                "Resource": instance_arn,
                "Condition": {
                    "StringEquals": {
                        format!("aws:RequestTag/kubernetes.io/cluster/{}", cluster): "owned"
                    }
                }
            },
            {
                "Sid": "RunInstancesVpcRestriction",
                "Effect": "Allow",
                "Action": "ec2:RunInstances",
                "Resource": format!("arn:{}:ec2:{}:{}:subnet/*", partition, region, account_id),
                "Condition": {
                    "StringEquals": {
                        "ec2:Vpc": format!("arn:{}:ec2:{}:{}:vpc/{}", partition, region, account_id, vpc)
                    }
                }
            },
            {
                "Sid": "InstanceActionsTagRestriction",
                "Effect": "Allow",
                "Action": ["ec2:TerminateInstances", "ec2:StartInstances", "ec2:StopInstances", "ec2:CreateTags"],
                "Resource": instance_arn,
                "Condition": {
                    "StringEquals": {
                        format!("ec2:ResourceTag/kubernetes.io/cluster/{}", cluster): ["owned", "shared"]
                    }
                }
            },
            {
                "Sid": "AutoscalingActionsTagRestriction",
                "Effect": "Allow",
                "Action": ["autoscaling:UpdateAutoScalingGroup", "autoscaling:SuspendProcesses", "autoscaling:ResumeProcesses", "autoscaling:TerminateInstanceInAutoScalingGroup"],
                "Resource": format!("arn:{}:autoscaling:{}:{}:autoScalingGroup:*:autoScalingGroupName/*", partition, region, account_id),
                "Condition": {
                    "StringEquals": {
                        format!("autoscaling:ResourceTag/kubernetes.io/cluster/{}", cluster): ["owned", "shared"]
                    }
                }
            },
            {
                "Sid": "EKS",
                "Effect": "Allow",
                "Action": ["eks:Describe*", "eks:List*"],
                "Resource": [
                    format!("arn:{}:eks:{}:{}:cluster/{}", partition, region, account_id, cluster),
                    format!("arn:{}:eks:{}:{}:nodegroup/{}/*/*", partition, region, account_id, cluster)
                ]
            }
        ]
    });

    let user_policy = json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "PassRoleEC2",
                "Effect": "Allow",
                "Action": "iam:PassRole",
                "Resource": format!("arn:{}:iam::{}:role/*", partition, account_id),
                "Condition": { "StringEquals": { "iam:PassedToService": "ec2.amazonaws.com" } }
            },
            {
                "Sid": "NonResourcePermissions",
                "Effect": "Allow",
                "Action": ["iam:CreateServiceLinkedRole", "ec2:CreateKeyPair", "ec2:DeleteKeyPair", "ec2:CreateTags", "ec2:ImportKeyPair"],
                "Resource": "*"
            }
        ]
    });

    let mut result = args.clone();
    result.insert("id".into(), Value::String(format!("{}-{}-{}", account_id, region, cluster)));
    result.insert("iamManagedPolicies".into(), json!(managed));
    result.insert("iamPolicyJson".into(), Value::String(policy.to_string()));
    result.insert("iamUserPolicyJson".into(), Value::String(user_policy.to_string()));
    Ok(result)
}

fn gke_policies(args: &Map<String, Value>) -> Result<Map<String, Value>> {
    let features = args.get("features").and_then(Value::as_object);

    let mut policies: Vec<&str> = GKE_BASE_PERMISSIONS.to_vec();
    if let Some(features) = features {
        for (feature, permissions) in GKE_FEATURE_PERMISSIONS {
            if features.get(*feature).and_then(Value::as_bool).unwrap_or(false) {
                policies.extend_from_slice(permissions);
            }
        }
    }
    policies.sort_unstable();
    policies.dedup();

    let mut result = args.clone();
    result.insert("id".into(), Value::String("gke".into()));
    result.insert("policies".into(), json!(policies));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_eks_settings_substitutes_arguments() {
        let result = compute(
            "eks_settings",
            &obj(json!({"accountId": "123", "region": "eu-central-1", "vpc": "vpc-1", "cluster": "prod"})),
        )
        .unwrap();
        assert_eq!(result["id"], "123-eu-central-1-prod");
        assert_eq!(
            result["iamManagedPolicies"][0],
            "arn:aws:iam::aws:policy/AmazonEC2ReadOnlyAccess"
        );
        let policy: Value = serde_json::from_str(result["iamPolicyJson"].as_str().unwrap()).unwrap();
        let text = policy.to_string();
        assert!(text.contains("kubernetes.io/cluster/prod"));
        assert!(text.contains("vpc/vpc-1"));
    }

    #[test]
    fn test_eks_settings_partition() {
        assert_eq!(partition("cn-north-1"), "aws-cn");
        assert_eq!(partition("us-gov-west-1"), "aws-us-gov");
        assert_eq!(partition("us-east-1"), "aws");
    }

    #[test]
    fn test_gke_policies_features_extend_base() {
        let base = compute("gke_policies", &Map::new()).unwrap();
        let extended = compute(
            "gke_policies",
            &obj(json!({"features": {"load_balancers_target_backend_pools": true}})),
        )
        .unwrap();
        let base_len = base["policies"].as_array().unwrap().len();
        let extended_policies = extended["policies"].as_array().unwrap();
        assert_eq!(extended_policies.len(), base_len + 4);
        assert!(extended_policies.contains(&json!("compute.targetPools.get")));
    }

    #[test]
    fn test_unknown_local() {
        assert!(compute("nope", &Map::new()).is_err());
    }
}
