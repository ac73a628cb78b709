use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use agentic_cli::api::{DebugMode, StreamMode, BASE_URL};
use agentic_cli::chat::{self, ChatSession};
use agentic_cli::client::{AgenticClient, ExecuteOptions};
use agentic_cli::config::{self, Config, DEFAULT_TIMEOUT_SECS};
use agentic_cli::error::{ApiError, ConfigError};
use agentic_cli::logging;
use agentic_cli::output;
use agentic_cli::profiles::{mask_api_key, Profile, ProfileStore};

const EXAMPLES: &str = "\
Examples:
  # Profile management
  agentic-cli profile add                      # Add a profile interactively
  agentic-cli profile add --name prod --api-key kg-... --app-id aa-...
  agentic-cli profile list
  agentic-cli profile set-default prod
  agentic-cli profile delete staging

  # Execute a run (session ID auto-generated when omitted)
  agentic-cli execute --query \"Hello\"
  agentic-cli execute --query \"Test\" --session-id custom-session-001
  agentic-cli execute --profile prod --query \"Hello\"
  agentic-cli execute --query \"Explain AI\" --stream tokens --debug --debug-mode thoughts

  # Check run status
  agentic-cli status --run-id run-xyz-789 --wait

  # Interactive chat
  agentic-cli chat --stream tokens

Configuration precedence (highest to lowest):
  1. Command-line flags (--api-key, --app-id, ...)
  2. Environment variables (KOREAI_API_KEY, KOREAI_APP_ID, ...)
  3. Profile values (--profile or the stored default)
  4. Built-in defaults

Environment variables:
  KOREAI_API_KEY   API key for authentication
  KOREAI_APP_ID    Application ID
  KOREAI_ENV_NAME  Environment name (default: production)
  KOREAI_BASE_URL  API base URL
  KOREAI_TIMEOUT   Request timeout in seconds (default: 30)";

#[derive(Parser)]
#[command(
    name = "agentic-cli",
    version,
    about = "Command-line interface for the Kore.ai Agentic App Platform",
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command that talks to the API.
#[derive(Args, Debug, Clone)]
struct CommonOpts {
    /// API key (overrides KOREAI_API_KEY)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Application ID (overrides KOREAI_APP_ID)
    #[arg(long, value_name = "ID")]
    app_id: Option<String>,

    /// Environment name (overrides KOREAI_ENV_NAME)
    #[arg(long, value_name = "NAME")]
    env_name: Option<String>,

    /// API base URL (overrides KOREAI_BASE_URL)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Request timeout in seconds (overrides KOREAI_TIMEOUT)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Path to a .env file
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Profile to use for configuration
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Verbose output (debug logging and full responses)
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Log level
    #[arg(long, default_value = "warn", value_name = "LEVEL",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,

    /// Write logs to a file as well
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Execute an agentic run
    Execute(ExecuteArgs),
    /// Check run status
    Status(StatusArgs),
    /// Start an interactive chat session
    Chat(ChatArgs),
    /// Show the effective configuration
    Config(ConfigArgs),
    /// Manage configuration profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

impl Command {
    fn common(&self) -> Option<&CommonOpts> {
        match self {
            Command::Execute(args) => Some(&args.common),
            Command::Status(args) => Some(&args.common),
            Command::Chat(args) => Some(&args.common),
            Command::Config(args) => Some(&args.common),
            Command::Profile { .. } => None,
        }
    }
}

#[derive(Args)]
struct ExecuteArgs {
    #[command(flatten)]
    common: CommonOpts,

    /// Query or input text for the agent
    #[arg(long, short = 'q', value_name = "TEXT")]
    query: String,

    /// Session identifier (auto-generated when omitted)
    #[arg(long, short = 's', value_name = "ID")]
    session_id: Option<String>,

    /// User identifier (defaults to the session identifier)
    #[arg(long, short = 'u', value_name = "ID")]
    user_id: Option<String>,

    /// Enable streaming with the given mode
    #[arg(long, value_enum, value_name = "MODE")]
    stream: Option<StreamMode>,

    /// Enable debug mode
    #[arg(long)]
    debug: bool,

    /// Debug detail level (requires --debug)
    #[arg(long, value_enum, value_name = "MODE")]
    debug_mode: Option<DebugMode>,

    /// JSON object of metadata key-value pairs
    #[arg(long, value_name = "JSON")]
    metadata: Option<String>,
}

#[derive(Args)]
struct StatusArgs {
    #[command(flatten)]
    common: CommonOpts,

    /// Run ID to check status for
    #[arg(long, short = 'r', value_name = "ID")]
    run_id: String,

    /// Wait for the run to complete
    #[arg(long)]
    wait: bool,

    /// Polling interval in seconds when waiting
    #[arg(long, default_value_t = 2, value_name = "SECONDS")]
    poll_interval: u64,

    /// Maximum polling attempts when waiting
    #[arg(long, default_value_t = 30, value_name = "N")]
    max_attempts: u32,
}

#[derive(Args)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonOpts,

    /// Session identifier (auto-generated when omitted)
    #[arg(long, short = 's', value_name = "ID")]
    session_id: Option<String>,

    /// User identifier (defaults to the session identifier)
    #[arg(long, short = 'u', value_name = "ID")]
    user_id: Option<String>,

    /// Enable streaming with the given mode
    #[arg(long, value_enum, value_name = "MODE")]
    stream: Option<StreamMode>,

    /// Enable debug mode
    #[arg(long)]
    debug: bool,

    /// Debug detail level (requires --debug)
    #[arg(long, value_enum, value_name = "MODE")]
    debug_mode: Option<DebugMode>,

    /// JSON object of metadata key-value pairs
    #[arg(long, value_name = "JSON")]
    metadata: Option<String>,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Add or update a profile
    Add(ProfileAddArgs),
    /// List all profiles
    List {
        /// Show full API keys instead of masked ones
        #[arg(long)]
        show_keys: bool,
    },
    /// Delete a profile
    Delete {
        /// Profile name to delete
        name: String,
    },
    /// Set the default profile
    SetDefault {
        /// Profile name to use by default
        name: String,
    },
}

#[derive(Args)]
struct ProfileAddArgs {
    /// Profile name (prompts interactively when omitted)
    #[arg(long)]
    name: Option<String>,

    /// API key
    #[arg(long)]
    api_key: Option<String>,

    /// App ID
    #[arg(long)]
    app_id: Option<String>,

    /// Environment name (default: the profile name)
    #[arg(long)]
    env_name: Option<String>,

    /// Base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command.common() {
        Some(common) => logging::init(&common.log_level, common.log_file.as_deref(), common.verbose),
        None => logging::init("warn", None, false),
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), ApiError> {
    match command {
        Command::Profile { command } => handle_profile(command).await,
        Command::Config(args) => {
            let config = load_config(&args.common).await?;
            handle_config(&config, args.common.json);
            Ok(())
        }
        Command::Execute(args) => {
            let config = load_config(&args.common).await?;
            let client = AgenticClient::new(config)?;
            handle_execute(&client, args).await
        }
        Command::Status(args) => {
            let config = load_config(&args.common).await?;
            let client = AgenticClient::new(config)?;
            handle_status(&client, args).await
        }
        Command::Chat(args) => {
            let config = load_config(&args.common).await?;
            let client = AgenticClient::new(config)?;
            handle_chat(&client, args).await
        }
    }
}

/// Assemble the effective configuration: defaults, then the selected
/// profile, then environment variables, then command-line flags.
async fn load_config(common: &CommonOpts) -> Result<Config, ApiError> {
    let store = ProfileStore::open_default()?;
    let profile_name = match &common.profile {
        Some(name) => Some(name.clone()),
        None => store.default_profile().await?,
    };

    let mut config = Config::default();
    if let Some(name) = profile_name {
        let profile = store.get(&name).await?;
        debug!(profile = %name, "using profile");
        config.apply_profile(&profile);
    }

    config::load_env_file(common.env_file.as_deref())?;
    config.overlay_env()?;

    if let Some(api_key) = &common.api_key {
        config.api_key = Some(api_key.clone());
    }
    if let Some(app_id) = &common.app_id {
        config.app_id = Some(app_id.clone());
    }
    if let Some(env_name) = &common.env_name {
        config.env_name = env_name.clone();
    }
    if let Some(base_url) = &common.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = common.timeout {
        config.timeout_secs = timeout;
    }

    debug!(%config, "configuration loaded");
    Ok(config)
}

fn parse_metadata(raw: Option<&str>) -> Result<Option<Map<String, Value>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| ApiError::Validation(format!("invalid JSON in --metadata: {e}"))),
    }
}

fn require_debug_for_mode(debug: bool, debug_mode: Option<DebugMode>) -> Result<(), ApiError> {
    if debug_mode.is_some() && !debug {
        return Err(ApiError::Validation(
            "--debug-mode requires --debug to be set".into(),
        ));
    }
    Ok(())
}

async fn handle_execute(client: &AgenticClient, args: ExecuteArgs) -> Result<(), ApiError> {
    require_debug_for_mode(args.debug, args.debug_mode)?;
    let metadata = parse_metadata(args.metadata.as_deref())?;
    let session_id = args.session_id.unwrap_or_else(chat::generate_session_id);

    info!(session_id = %session_id, "executing run");
    if args.common.verbose {
        eprintln!("Executing run with session: {session_id}");
        if let Some(user_id) = &args.user_id {
            eprintln!("User ID: {user_id}");
        }
        eprintln!("Query: {}", args.query);
    }

    let opts = ExecuteOptions {
        user_reference: args.user_id,
        stream_mode: args.stream,
        debug: args.debug,
        debug_mode: args.debug_mode,
        metadata,
    };
    let reply = client.execute_run(&args.query, &session_id, &opts).await?;
    output::print_reply(&reply, args.common.json, args.common.verbose);
    Ok(())
}

async fn handle_status(client: &AgenticClient, args: StatusArgs) -> Result<(), ApiError> {
    info!(run_id = %args.run_id, wait = args.wait, "checking run status");
    let reply = if args.wait {
        client
            .poll_run_status(&args.run_id, args.max_attempts, args.poll_interval)
            .await?
    } else {
        client.get_run_status(&args.run_id, None).await?
    };
    output::print_status(&reply, args.common.json, args.common.verbose);
    Ok(())
}

async fn handle_chat(client: &AgenticClient, args: ChatArgs) -> Result<(), ApiError> {
    require_debug_for_mode(args.debug, args.debug_mode)?;
    let metadata = parse_metadata(args.metadata.as_deref())?;
    let session = ChatSession {
        session_id: args.session_id.unwrap_or_else(chat::generate_session_id),
        opts: ExecuteOptions {
            user_reference: args.user_id,
            stream_mode: args.stream,
            debug: args.debug,
            debug_mode: args.debug_mode,
            metadata,
        },
        verbose: args.common.verbose,
    };
    chat::run(client, session).await
}

fn handle_config(config: &Config, as_json: bool) {
    if as_json {
        let value = json!({
            "api_key": config.masked_api_key(),
            "app_id": config.app_id.as_deref().unwrap_or("Not set"),
            "env_name": config.env_name,
            "base_url": config.base_url,
            "timeout": config.timeout_secs,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        println!("Current configuration:");
        println!("  {config}");
    }
}

async fn handle_profile(command: ProfileCommand) -> Result<(), ApiError> {
    let store = ProfileStore::open_default()?;
    match command {
        ProfileCommand::Add(args) => profile_add(&store, args).await,
        ProfileCommand::List { show_keys } => profile_list(&store, show_keys).await,
        ProfileCommand::Delete { name } => profile_delete(&store, &name).await,
        ProfileCommand::SetDefault { name } => {
            store.set_default(&name).await?;
            println!("Default profile set to '{name}'");
            Ok(())
        }
    }
}

fn prompt_error(e: dialoguer::Error) -> ApiError {
    ConfigError::Store(format!("prompt failed: {e}")).into()
}

async fn profile_add(store: &ProfileStore, args: ProfileAddArgs) -> Result<(), ApiError> {
    let interactive = args.name.is_none();
    let name = match args.name {
        Some(name) => name.trim().to_string(),
        None => Input::<String>::new()
            .with_prompt("Profile name")
            .interact_text()
            .map_err(prompt_error)?
            .trim()
            .to_string(),
    };
    if name.is_empty() {
        return Err(ApiError::Validation("profile name cannot be empty".into()));
    }

    let api_key = match args.api_key {
        Some(key) => key,
        None => Password::new()
            .with_prompt("API key")
            .interact()
            .map_err(prompt_error)?,
    };
    let app_id = match args.app_id {
        Some(app_id) => app_id,
        None => Input::<String>::new()
            .with_prompt("App ID")
            .interact_text()
            .map_err(prompt_error)?,
    };

    let (env_name, base_url, timeout) = if interactive {
        let env_name = Input::<String>::new()
            .with_prompt("Environment name")
            .default(name.clone())
            .interact_text()
            .map_err(prompt_error)?;
        let base_url = Input::<String>::new()
            .with_prompt("Base URL")
            .default(BASE_URL.into())
            .interact_text()
            .map_err(prompt_error)?;
        let timeout = Input::<u64>::new()
            .with_prompt("Timeout (seconds)")
            .default(DEFAULT_TIMEOUT_SECS)
            .interact_text()
            .map_err(prompt_error)?;
        (env_name, base_url, timeout)
    } else {
        (
            args.env_name.unwrap_or_else(|| name.clone()),
            args.base_url.unwrap_or_else(|| BASE_URL.into()),
            args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    };

    if store.load().await?.contains_key(&name) {
        let overwrite = Confirm::new()
            .with_prompt(format!("Profile '{name}' already exists. Overwrite?"))
            .default(false)
            .interact()
            .map_err(prompt_error)?;
        if !overwrite {
            println!("Cancelled");
            return Ok(());
        }
    }

    let now = Utc::now();
    store
        .add(
            &name,
            Profile {
                api_key,
                app_id,
                env_name,
                base_url,
                timeout,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    println!("Profile '{name}' saved successfully");
    Ok(())
}

async fn profile_list(store: &ProfileStore, show_keys: bool) -> Result<(), ApiError> {
    let profiles = store.load().await?;
    if profiles.is_empty() {
        println!("No profiles configured");
        println!();
        println!("To add a profile, run: agentic-cli profile add");
        return Ok(());
    }

    let default = store.default_profile().await?;
    println!("Available profiles ({}):", profiles.len());
    println!();
    for (name, profile) in &profiles {
        let marker = if default.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        let api_key = if show_keys {
            profile.api_key.clone()
        } else {
            mask_api_key(&profile.api_key)
        };
        println!("  {name}{marker}");
        println!("    API key:     {api_key}");
        println!("    App ID:      {}", profile.app_id);
        println!("    Environment: {}", profile.env_name);
        println!("    Base URL:    {}", profile.base_url);
        println!("    Timeout:     {}s", profile.timeout);
        println!();
    }
    Ok(())
}

async fn profile_delete(store: &ProfileStore, name: &str) -> Result<(), ApiError> {
    let confirmed = Confirm::new()
        .with_prompt(format!("Delete profile '{name}'?"))
        .default(false)
        .interact()
        .map_err(prompt_error)?;
    if !confirmed {
        println!("Cancelled");
        return Ok(());
    }

    store.delete(name).await?;
    println!("Profile '{name}' deleted successfully");

    if store.default_profile().await?.is_none() && !store.names().await?.is_empty() {
        println!();
        println!("Note: no default profile is set. Set one with:");
        println!("  agentic-cli profile set-default <name>");
    }
    Ok(())
}
