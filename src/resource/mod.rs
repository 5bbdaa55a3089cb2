//! Resource abstraction layer
//!
//! This module provides a data-driven approach to binding CAST AI objects.
//! Resource and data source schemas are loaded from JSON files at compile
//! time; one generic engine serves every type.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches schemas from embedded JSON
//! - [`binding`] - Generic Create / Lookup / IsInstance ([`CustomResource`])
//! - [`types`] - Typed façades (`EksCluster`, `GkeCluster`, ...)
//! - [`property`] - Input builder and eventual [`Output`] values
//! - [`data_source`] - Data source invocation and typed results
//! - [`token`] - Type token helpers
//!
//! # Schema Definitions
//!
//! Schemas are defined in JSON files under `src/resources/`, one per module:
//! - `aws.json`, `gcp.json`, `azure.json` - Cluster connections
//! - `autoscaling.json`, `nodeconfig.json`, `rebalancing.json` - Cluster policy
//! - `organization.json`, `iam.json` - Organization and access control
//!
//! # Example
//!
//! ```ignore
//! use castai_provider::resource::{EksCluster, Inputs, ResourceOptions};
//!
//! let cluster = EksCluster::new(
//!     &ctx,
//!     "production",
//!     Inputs::new().set("accountId", "123456789012").set("region", "us-east-1"),
//!     ResourceOptions::default(),
//! )?;
//! let token = cluster.cluster_token().get().await?;
//! ```

pub mod binding;
pub mod data_source;
pub mod property;
pub mod registry;
pub mod token;
pub mod types;

pub use binding::{is_instance_of, CustomResource, HasTypeToken, ResourceOptions};
pub use property::{get_path, Input, Inputs, Output, OutputValue, ResolvedInputs};
pub use registry::{
    all_data_source_tokens, all_resource_tokens, get_data_source_schema, get_resource_schema,
    DataSourceSchema, PropertyDef, PropertyType, ResourceSchema,
};
pub use types::*;
