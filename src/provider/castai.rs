//! CAST AI provider
//!
//! Implements [`ProviderService`] against the CAST AI REST API. Every
//! operation is driven by the schema's REST mapping; there is no per-type
//! code here.

use super::dispatch::{
    extract_id, find_item, map_outputs, parse_method, render_body, render_id, render_path,
};
use super::{policies, CreateResult, ProviderService, ReadResult};
use crate::castai::CastAiClient;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::resource::property::get_path;
use crate::resource::registry::{
    get_data_source_schema, get_resource_schema, ApiDef, CallDef, ResourceSchema,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Provider backed by the CAST AI API
#[derive(Default)]
pub struct CastAiProvider {
    client: RwLock<Option<CastAiClient>>,
}

impl CastAiProvider {
    /// An unconfigured provider; call `configure` before remote operations
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: CastAiClient) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    async fn client(&self) -> Result<CastAiClient> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Config("provider is not configured".into()))
    }

    fn schema(token: &str) -> Result<(&'static ResourceSchema, &'static ApiDef)> {
        let schema =
            get_resource_schema(token).ok_or_else(|| ProviderError::UnknownType(token.to_string()))?;
        let api = schema
            .api
            .as_ref()
            .ok_or_else(|| ProviderError::UnknownType(format!("{} has no API mapping", token)))?;
        Ok((schema, api))
    }

    /// Issue one mapped call and return the raw response
    async fn call(
        client: &CastAiClient,
        call: &CallDef,
        id: Option<&str>,
        values: &Map<String, Value>,
    ) -> Result<Value> {
        let method = parse_method(&call.method)?;
        let path = render_path(&call.path, id, values)?;
        let body = match &call.body {
            Some(template) => render_body(template, values)?,
            None => None,
        };
        client.request(method, &path, body.as_ref()).await
    }
}

/// Overlay `extra` onto `base`
fn merge(base: &mut Map<String, Value>, extra: Map<String, Value>) {
    for (k, v) in extra {
        base.insert(k, v);
    }
}

#[async_trait]
impl ProviderService for CastAiProvider {
    async fn configure(&self, config: ProviderConfig) -> Result<()> {
        tracing::info!(
            "Configuring provider for {} (token from {})",
            config.api_url(),
            config.token_source()
        );
        let client = CastAiClient::new(config)?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn create(&self, token: &str, inputs: &Map<String, Value>) -> Result<CreateResult> {
        let (schema, api) = Self::schema(token)?;
        let client = self.client().await?;

        tracing::info!("Creating {}", token);
        let response = Self::call(&client, &api.create, None, inputs).await?;

        let id = match &api.id_template {
            Some(template) => render_id(template, inputs)?,
            None => extract_id(&response, &api.id_path)?,
        };

        let mut outputs = inputs.clone();
        merge(
            &mut outputs,
            map_outputs(&api.create.outputs, &response, &schema.properties),
        );

        for call in &api.post_create {
            let response = Self::call(&client, call, Some(&id), &outputs).await?;
            merge(&mut outputs, map_outputs(&call.outputs, &response, &schema.properties));
        }

        tracing::info!("Created {} {}", token, id);
        Ok(CreateResult { id, outputs })
    }

    async fn read(
        &self,
        token: &str,
        id: &str,
        state: &Map<String, Value>,
    ) -> Result<Option<ReadResult>> {
        let (schema, api) = Self::schema(token)?;
        let Some(read) = &api.read else {
            return Ok(Some(ReadResult {
                id: id.to_string(),
                outputs: state.clone(),
            }));
        };
        let client = self.client().await?;

        let response = match Self::call(&client, read, Some(id), state).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} is gone", token, id);
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        let mut outputs = state.clone();
        merge(&mut outputs, map_outputs(&read.outputs, &response, &schema.properties));
        Ok(Some(ReadResult {
            id: id.to_string(),
            outputs,
        }))
    }

    async fn update(
        &self,
        token: &str,
        id: &str,
        olds: &Map<String, Value>,
        news: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let (schema, api) = Self::schema(token)?;

        // Output-only values survive an update unless the backend returns new ones
        let mut outputs = news.clone();
        for name in schema.output_only() {
            if let Some(v) = olds.get(name) {
                outputs.entry(name.to_string()).or_insert_with(|| v.clone());
            }
        }

        let Some(update) = &api.update else {
            return Ok(outputs);
        };
        let client = self.client().await?;

        tracing::info!("Updating {} {}", token, id);
        let response = Self::call(&client, update, Some(id), news).await?;
        merge(&mut outputs, map_outputs(&update.outputs, &response, &schema.properties));
        Ok(outputs)
    }

    async fn delete(&self, token: &str, id: &str, state: &Map<String, Value>) -> Result<()> {
        let (_, api) = Self::schema(token)?;
        if api.delete.is_empty() {
            tracing::debug!("{} has no delete call; dropping {} from state only", token, id);
            return Ok(());
        }
        let client = self.client().await?;

        tracing::info!("Deleting {} {}", token, id);
        for call in &api.delete {
            Self::call(&client, call, Some(id), state).await?;
        }
        Ok(())
    }

    async fn invoke(&self, token: &str, args: &Map<String, Value>) -> Result<Map<String, Value>> {
        let schema = get_data_source_schema(token)
            .ok_or_else(|| ProviderError::UnknownType(token.to_string()))?;

        if let Some(missing) = schema
            .required_args()
            .into_iter()
            .find(|a| args.get(*a).map_or(true, Value::is_null))
        {
            return Err(ProviderError::missing(token, missing));
        }

        if let Some(local) = &schema.local {
            return policies::compute(local, args);
        }
        let query = schema
            .api
            .as_ref()
            .ok_or_else(|| ProviderError::UnknownType(format!("{} has no API mapping", token)))?;
        let client = self.client().await?;

        let path = render_path(&query.path, None, args)?;
        let body = match &query.body {
            Some(template) => render_body(template, args)?,
            None => None,
        };
        let response = client
            .request(parse_method(&query.method)?, &path, body.as_ref())
            .await?;

        let item = match &query.items_path {
            None => response,
            Some(items_path) => {
                if !query.r#match.is_empty()
                    && query
                        .r#match
                        .values()
                        .all(|arg| args.get(arg).map_or(true, Value::is_null))
                {
                    let names: Vec<&str> = query.r#match.values().map(|s| s.as_str()).collect();
                    return Err(ProviderError::InvalidProperty {
                        property: names.join(", "),
                        message: "at least one lookup argument must be set".into(),
                    });
                }
                let items = get_path(&response, items_path)
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                find_item(items, &query.r#match, args)
                    .cloned()
                    .ok_or_else(|| ProviderError::NotFound(format!("{} matching {:?}", token, args)))?
            },
        };

        let mut result = args.clone();
        merge(&mut result, map_outputs(&query.outputs, &item, &schema.results));
        if let Some(template) = &query.id_template {
            result.insert("id".into(), Value::String(render_id(template, args)?));
        }
        Ok(result)
    }
}
