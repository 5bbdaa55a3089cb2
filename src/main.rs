use anyhow::{bail, Context as _, Result};
use castai_provider::castai::format_api_error;
use castai_provider::config::{ConfigFile, ConfigOverrides, ProviderConfig};
use castai_provider::resource::{
    all_data_source_tokens, all_resource_tokens, get_data_source_schema, get_resource_schema,
    CustomResource, Inputs, ResourceOptions,
};
use castai_provider::runtime::LocalMonitor;
use castai_provider::{CastAiProvider, ProviderError, ProviderService, VERSION};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage CAST AI resources from the command line
#[derive(Parser, Debug)]
#[command(name = "castai-provider", version = VERSION, about, long_about = None)]
struct Args {
    /// CAST AI API token (falls back to CASTAI_API_TOKEN, then the config file)
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// CAST AI API base URL (falls back to CASTAI_API_URL, then the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Project name used in resource URNs
    #[arg(long, global = true, default_value = "castai")]
    project: String,

    /// Stack name used in resource URNs
    #[arg(long, global = true, default_value = "dev")]
    stack: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the embedded resource and data source schemas
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Create a resource from an inputs document (YAML or JSON, `-` for stdin)
    Create {
        type_token: String,
        name: String,
        #[arg(short, long)]
        inputs: PathBuf,
        /// Print secret outputs in clear text
        #[arg(long)]
        show_secrets: bool,
    },
    /// Adopt an existing resource by ID and print its state
    Import {
        type_token: String,
        name: String,
        id: String,
        /// Known inputs used to address the resource
        #[arg(short, long)]
        inputs: Option<PathBuf>,
        #[arg(long)]
        show_secrets: bool,
    },
    /// Read a resource's current state from the backend
    Read {
        type_token: String,
        id: String,
        /// Known state used to address the resource
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Delete a resource by ID
    Delete {
        type_token: String,
        id: String,
        /// Known state used to address the resource
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Invoke a data source
    Invoke {
        token: String,
        #[arg(short, long)]
        args: Option<PathBuf>,
    },
    /// Show or persist provider configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaAction {
    /// List every resource and data source token
    List,
    /// Print one schema as JSON
    Show { token: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the resolved configuration (token redacted)
    Show,
    /// Write the given --api-url / --api-token / --timeout to the config file
    Save,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled: cannot open {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("castai-provider {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("castai-provider").join("castai-provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".castai-provider").join("castai-provider.log");
    }
    PathBuf::from("castai-provider.log")
}

/// Read a YAML or JSON object from a file, or stdin for `-`
fn read_document(path: &Path) -> Result<Map<String, Value>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?
    };
    let value: Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {:?}", path))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => bail!("{:?} must contain a mapping of property names to values", path),
    }
}

fn read_optional(path: Option<&PathBuf>) -> Result<Map<String, Value>> {
    path.map_or_else(|| Ok(Map::new()), |p| read_document(p))
}

fn overrides(args: &Args) -> ConfigOverrides {
    ConfigOverrides {
        api_token: args.api_token.clone(),
        api_url: args.api_url.clone(),
        request_timeout: args.timeout.map(std::time::Duration::from_secs),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn provider(args: &Args) -> Result<Arc<CastAiProvider>> {
    let config = ProviderConfig::resolve(&overrides(args), &ConfigFile::load())?;
    let provider = Arc::new(CastAiProvider::new());
    provider.configure(config).await?;
    Ok(provider)
}

/// Print a bound resource's state, redacting secrets unless asked not to
async fn print_resource(
    monitor: &LocalMonitor,
    resource: &CustomResource,
    show_secrets: bool,
) -> Result<()> {
    let urn = resource.urn().get().await?;
    if show_secrets {
        let outputs = resource.outputs().get().await?;
        let id = resource.id().get().await?;
        return print_json(&serde_json::json!({"urn": urn, "id": id, "outputs": outputs}));
    }
    let snapshot = monitor.snapshot().await;
    match snapshot.resources.iter().find(|r| r.urn == urn) {
        Some(entry) => print_json(entry),
        None => bail!("{} was not recorded", urn),
    }
}

async fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Schema { action } => match action {
            SchemaAction::List => {
                print_json(&serde_json::json!({
                    "resources": all_resource_tokens(),
                    "dataSources": all_data_source_tokens(),
                }))
            },
            SchemaAction::Show { token } => {
                if let Some(schema) = get_resource_schema(token) {
                    print_json(schema)
                } else if let Some(schema) = get_data_source_schema(token) {
                    print_json(schema)
                } else {
                    Err(ProviderError::UnknownType(token.clone()).into())
                }
            },
        },
        Command::Create {
            type_token,
            name,
            inputs,
            show_secrets,
        } => {
            let inputs = Inputs::from_value(Value::Object(read_document(inputs)?));
            let monitor = LocalMonitor::new(provider(&args).await?, &args.project, &args.stack);
            let resource = CustomResource::new(
                &monitor.context(),
                type_token,
                name,
                inputs,
                ResourceOptions::default(),
            )?;
            print_resource(&monitor, &resource, *show_secrets).await
        },
        Command::Import {
            type_token,
            name,
            id,
            inputs,
            show_secrets,
        } => {
            let state = read_optional(inputs.as_ref())?;
            let monitor = LocalMonitor::new(provider(&args).await?, &args.project, &args.stack);
            let resource = CustomResource::get(
                &monitor.context(),
                type_token,
                name,
                id,
                Some(Inputs::from_value(Value::Object(state))),
            )?;
            print_resource(&monitor, &resource, *show_secrets).await
        },
        Command::Read {
            type_token,
            id,
            state,
        } => {
            let state = read_optional(state.as_ref())?;
            match provider(&args).await?.read(type_token, id, &state).await? {
                Some(read) => print_json(&read),
                None => bail!("{} {} no longer exists", type_token, id),
            }
        },
        Command::Delete {
            type_token,
            id,
            state,
        } => {
            let state = read_optional(state.as_ref())?;
            provider(&args).await?.delete(type_token, id, &state).await?;
            println!("Deleted {} {}", type_token, id);
            Ok(())
        },
        Command::Invoke { token, args: path } => {
            let invoke_args = read_optional(path.as_ref())?;
            let result = provider(&args).await?.invoke(token, &invoke_args).await?;
            print_json(&result)
        },
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let config = ProviderConfig::resolve(&overrides(&args), &ConfigFile::load())?;
                let token = if config.has_token() { "[secret]" } else { "" };
                print_json(&serde_json::json!({
                    "apiUrl": config.api_url().as_str(),
                    "apiUrlSource": config.url_source().to_string(),
                    "apiToken": token,
                    "apiTokenSource": config.token_source().to_string(),
                    "requestTimeoutSecs": config.request_timeout().as_secs(),
                    "configFile": ConfigFile::config_path(),
                }))
            },
            ConfigAction::Save => {
                let mut file = ConfigFile::load();
                if let Some(url) = &args.api_url {
                    file.api_url = Some(url.clone());
                }
                if let Some(token) = &args.api_token {
                    file.api_token = Some(token.clone());
                }
                if let Some(timeout) = args.timeout {
                    file.request_timeout_secs = Some(timeout);
                }
                file.save().context("saving config file")?;
                println!("Saved {:?}", ConfigFile::config_path());
                Ok(())
            },
        },
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        match err.downcast_ref::<ProviderError>() {
            Some(e @ ProviderError::Api { .. }) => eprintln!("Error: {}", format_api_error(e)),
            _ => eprintln!("Error: {err:#}"),
        }
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castai_provider::config::ValueSource;

    #[test]
    fn test_env_token_is_not_a_flag_value() {
        let args = Args::try_parse_from(["castai-provider", "config", "save"]).unwrap();
        assert!(args.api_token.is_none());
        assert!(args.api_url.is_none());

        let env = |key: &str| (key == "CASTAI_API_TOKEN").then(|| "env-token".to_string());
        let config =
            ProviderConfig::resolve_with(&overrides(&args), &ConfigFile::default(), env).unwrap();
        assert_eq!(config.token_source(), ValueSource::Environment);
    }

    #[test]
    fn test_flag_token_is_explicit() {
        let args =
            Args::try_parse_from(["castai-provider", "--api-token", "flag-token", "config", "show"])
                .unwrap();
        let config =
            ProviderConfig::resolve_with(&overrides(&args), &ConfigFile::default(), |_| None)
                .unwrap();
        assert_eq!(config.token_source(), ValueSource::Explicit);
        assert_eq!(config.require_token().unwrap(), "flag-token");
    }
}
