//! # SCM Hooks CLI
//!
//! Offline tooling around the webhook engine:
//!
//! - `parse` authenticates and decodes a captured webhook body
//! - `sign` produces the signature header Bitbucket would send
//! - `events` lists the event keys with a canonical mapping
//! - `config` validates and prints the resolved configuration

use clap::{Parser, Subcommand};
use scm_hooks_core::secrets::WebhookSecret;
use scm_hooks_core::webhook::bitbucket::{
    BitbucketWebhookProvider, EventKind, EVENT_KEY_HEADER, EVENT_TABLE, HOOK_UUID_HEADER,
};
use scm_hooks_core::webhook::validation::sign_body;
use scm_hooks_core::webhook::{
    SignatureAlgorithm, WebhookError, WebhookOutcome, WebhookParser, WebhookRequest,
    DEFAULT_MAX_BODY_BYTES,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod settings;

pub use settings::{CliConfig, ConfigError, LogFormat, LoggingConfig, SecretsConfig};

// ============================================================================
// CLI Structure
// ============================================================================

/// scm-hooks - authenticate and normalize source-control webhooks
#[derive(Parser)]
#[command(name = "scm-hooks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Authenticate and normalize source-control webhooks")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SCM_HOOKS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, overrides the configured level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate and decode a captured webhook
    Parse {
        /// Value of the X-Event-Key header
        #[arg(short, long)]
        event: String,

        /// File holding the raw request body
        #[arg(short, long)]
        body: PathBuf,

        /// Raw query string of the request, e.g. `secret=abc`
        #[arg(short, long)]
        query: Option<String>,

        /// Value of the X-Hub-Signature header
        #[arg(short, long)]
        signature: Option<String>,

        /// Value of the X-Hook-UUID header
        #[arg(long)]
        hook_uuid: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Compute the signature header for a body
    Sign {
        /// File holding the raw request body
        #[arg(short, long)]
        body: PathBuf,

        /// Secret to sign with; defaults to the configured default secret
        #[arg(short, long)]
        secret: Option<String>,

        /// Digest algorithm
        #[arg(short, long, default_value = "sha256")]
        algorithm: AlgorithmArg,
    },

    /// List event keys with a canonical mapping
    Events,

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Signature algorithm options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AlgorithmArg {
    Sha256,
    Sha1,
}

impl From<AlgorithmArg> for SignatureAlgorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Sha256 => SignatureAlgorithm::HmacSha256,
            AlgorithmArg::Sha1 => SignatureAlgorithm::HmacSha1,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Output error: {message}")]
    Output { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::InvalidArgument { .. } => 2,
            Self::Io(_) => 3,
            Self::Webhook(WebhookError::InvalidSignature) => 4,
            Self::Webhook(WebhookError::SecretResolution(_)) => 5,
            Self::Webhook(_) => 6,
            Self::Output { .. } => 7,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let output = run(cli).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Execute a parsed command line and return what should be printed
pub async fn run(cli: Cli) -> Result<String, CliError> {
    let config = CliConfig::load(cli.config.as_deref())?;

    initialize_logging(&cli, &config);

    match cli.command {
        Commands::Parse {
            event,
            body,
            query,
            signature,
            hook_uuid,
            format,
        } => {
            let request = ParseRequest {
                event,
                query,
                signature,
                hook_uuid,
            };
            execute_parse_command(&config, &request, &body, format).await
        }
        Commands::Sign {
            body,
            secret,
            algorithm,
        } => execute_sign_command(&config, &body, secret, algorithm).await,
        Commands::Events => Ok(execute_events_command()),
        Commands::Config { show, format } => execute_config_command(&config, show, format),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging; stdout stays reserved for command output
fn initialize_logging(cli: &Cli, config: &CliConfig) {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = cli.json_logs || config.logging.format == LogFormat::Json;

    let registry = tracing_subscriber::registry().with(filter);
    // A subscriber may already be installed when running under a test harness.
    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
}

/// Header and query values supplied to `parse`
#[derive(Debug, Clone, Default)]
pub struct ParseRequest {
    pub event: String,
    pub query: Option<String>,
    pub signature: Option<String>,
    pub hook_uuid: Option<String>,
}

impl ParseRequest {
    fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(EVENT_KEY_HEADER.to_string(), self.event.clone());
        if let Some(hook_uuid) = &self.hook_uuid {
            headers.insert(HOOK_UUID_HEADER.to_string(), hook_uuid.clone());
        }
        headers
    }

    fn uri(&self) -> String {
        match self.query.as_deref() {
            Some(query) => format!("/?{}", query.trim_start_matches('?')),
            None => "/".to_string(),
        }
    }
}

/// Execute parse command
pub async fn execute_parse_command(
    config: &CliConfig,
    request: &ParseRequest,
    body: &Path,
    format: OutputFormat,
) -> Result<String, CliError> {
    info!(event = %request.event, body = %body.display(), "Parsing webhook");

    let provider = BitbucketWebhookProvider::new(config.provider.clone())
        .map_err(ConfigError::from)?;

    let mut headers = request.headers();
    if let Some(signature) = &request.signature {
        headers.insert(
            config.provider.signature.header_name.clone(),
            signature.clone(),
        );
    }

    let file = tokio::fs::File::open(body).await?;
    let webhook = WebhookRequest::read_from(
        "POST",
        &request.uri(),
        headers,
        file,
        DEFAULT_MAX_BODY_BYTES,
    )
    .await?;

    let resolver = config.secrets.resolver();
    match provider.parse(&webhook, &resolver).await? {
        WebhookOutcome::Event(event) => render(&event, format),
        WebhookOutcome::Unhandled { event_key } => {
            debug!(event_key = %event_key, "Event has no canonical mapping");
            render(&UnhandledReport { unhandled: event_key }, format)
        }
    }
}

#[derive(Serialize)]
struct UnhandledReport {
    unhandled: String,
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(output_error)?,
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(output_error)?,
    };
    Ok(rendered.trim_end().to_string())
}

fn output_error(error: impl std::fmt::Display) -> CliError {
    CliError::Output {
        message: error.to_string(),
    }
}

/// Execute sign command
pub async fn execute_sign_command(
    config: &CliConfig,
    body: &Path,
    secret: Option<String>,
    algorithm: AlgorithmArg,
) -> Result<String, CliError> {
    let secret = secret
        .or_else(|| config.secrets.default.clone())
        .filter(|s| !s.is_empty())
        .map(WebhookSecret::new)
        .ok_or_else(|| CliError::InvalidArgument {
            arg: "secret".to_string(),
            message: "no --secret given and no default secret configured".to_string(),
        })?;

    let payload = tokio::fs::read(body).await?;
    Ok(sign_body(algorithm.into(), &secret, &payload))
}

/// Execute events command
pub fn execute_events_command() -> String {
    EVENT_TABLE
        .iter()
        .map(|(key, kind)| format!("{:<30} {}", key, describe(*kind)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(kind: EventKind) -> String {
    match (kind, kind.pull_request_action()) {
        (_, Some(action)) => format!("pull_request ({})", action),
        (EventKind::PullRequestCommentCreated, None) => "pull_request_comment (created)".to_string(),
        _ => "push, branch, tag".to_string(),
    }
}

/// Execute config command
pub fn execute_config_command(
    config: &CliConfig,
    show: bool,
    format: ConfigFormat,
) -> Result<String, CliError> {
    config.validate()?;

    if !show {
        return Ok("Configuration is valid".to_string());
    }

    let redacted = config.redacted();
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&redacted).map_err(output_error)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&redacted).map_err(output_error)?,
        ConfigFormat::Toml => toml::to_string(&redacted).map_err(output_error)?,
    };
    Ok(rendered.trim_end().to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
